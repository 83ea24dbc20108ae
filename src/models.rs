// ABOUTME: Core data models for campaigns, contacts, call history, and user settings
// ABOUTME: Defines the status machines and wire representations shared by stores and scheduler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! # Data Models
//!
//! Core data structures for the campaign scheduler. Enum values serialize to
//! the wire strings stored in the database and returned by the admin API
//! (`"paused-time-window"`, `"in-progress"`, `"no-answer"`, ...).

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Campaign dialing mode
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignType {
    /// Dialed by the scheduler within its time window
    Outbound,
    /// Receives calls; never dialed by the scheduler
    Inbound,
    /// Dialed one contact at a time through the instant-call endpoint
    Ondemand,
}

impl CampaignType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::Inbound => "inbound",
            Self::Ondemand => "ondemand",
        }
    }
}

impl FromStr for CampaignType {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "outbound" => Ok(Self::Outbound),
            "inbound" => Ok(Self::Inbound),
            "ondemand" => Ok(Self::Ondemand),
            other => Err(AppError::invalid_input(format!(
                "unknown campaign type: {other}"
            ))),
        }
    }
}

/// Campaign lifecycle status
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CampaignStatus {
    /// Created but not yet schedulable
    #[serde(rename = "draft")]
    Draft,
    /// Waiting for its time window to open
    #[serde(rename = "scheduled")]
    Scheduled,
    /// Currently eligible for dialing
    #[serde(rename = "active")]
    Active,
    /// Paused by an operator; in-flight calls drain naturally
    #[serde(rename = "paused")]
    Paused,
    /// Window closed with pending work remaining; auto-resumes next window
    #[serde(rename = "paused-time-window")]
    PausedTimeWindow,
    /// All contacts reached a terminal status
    #[serde(rename = "completed")]
    Completed,
}

impl CampaignStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::PausedTimeWindow => "paused-time-window",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "paused-time-window" => Ok(Self::PausedTimeWindow),
            "completed" => Ok(Self::Completed),
            other => Err(AppError::invalid_input(format!(
                "unknown campaign status: {other}"
            ))),
        }
    }
}

impl Display for CampaignStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Per-contact call status
///
/// Legal transitions run `pending -> in-progress -> {completed | failed |
/// no-answer}`; the only path back to `pending` is an operator state reset.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CallStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "no-answer")]
    NoAnswer,
}

impl CallStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NoAnswer => "no-answer",
        }
    }

    /// Whether this status is final for the contact
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::NoAnswer)
    }
}

impl FromStr for CallStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "no-answer" => Ok(Self::NoAnswer),
            other => Err(AppError::invalid_input(format!(
                "unknown call status: {other}"
            ))),
        }
    }
}

impl Display for CallStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Normalized terminal outcome of a call, projected from any webhook source
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CallOutcome {
    Completed,
    Failed,
    NoAnswer,
}

impl CallOutcome {
    /// The contact status this outcome maps to
    #[must_use]
    pub const fn call_status(self) -> CallStatus {
        match self {
            Self::Completed => CallStatus::Completed,
            Self::Failed => CallStatus::Failed,
            Self::NoAnswer => CallStatus::NoAnswer,
        }
    }
}

/// Daily dialing window in a named timezone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    /// First calendar date the window opens
    pub scheduled_date: NaiveDate,
    /// Window start, wall clock in `timezone`
    pub scheduled_time: NaiveTime,
    /// Window end, wall clock in `timezone`; ends before start roll past midnight
    pub end_time: Option<NaiveTime>,
    /// IANA timezone name, e.g. `America/New_York`
    pub timezone: String,
}

/// A campaign's outbound transport: which provider dials, and from what number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMedium {
    /// Telephony provider tag (`twilio`, `plivo`, `telnyx`)
    pub provider: String,
    /// E.164 caller ID
    pub from_phone: String,
}

/// One outbound dialing target inside a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub campaign_id: Uuid,
    /// Insertion order; contacts are dialed in ascending position
    pub position: i64,
    pub name: String,
    /// E.164-normalized number
    pub phone_number: String,
    pub call_status: CallStatus,
    /// Voice engine call id once a call was created for this contact
    pub engine_call_id: Option<String>,
    pub call_history_id: Option<String>,
    pub called_at: Option<DateTime<Utc>>,
    /// Seconds of talk time once the call terminated
    pub call_duration: Option<i64>,
    pub call_notes: Option<String>,
}

/// A named collection of contacts dialed by one agent within one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub campaign_type: CampaignType,
    /// Voice-AI agent that answers on the call
    pub agent_id: String,
    pub status: CampaignStatus,
    pub schedule: Option<Schedule>,
    pub outbound_medium: Option<OutboundMedium>,
    pub completed_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub paused_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Whether the scheduler loop dials this campaign
    #[must_use]
    pub const fn is_dialable(&self) -> bool {
        matches!(self.campaign_type, CampaignType::Outbound)
    }
}

/// Credentials for one telephony provider account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelephonyCredentials {
    /// Account identifier (Twilio Account SID, Plivo Auth ID, Telnyx connection id)
    pub account_id: String,
    /// API secret or auth token
    pub auth_token: String,
    /// Override for the provider API base URL, mainly for tests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Per-user operator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: Uuid,
    /// Concurrent-call budget across all of the user's campaigns
    pub max_concurrent_calls: u32,
    /// Telephony credentials keyed by provider tag
    pub telephony: HashMap<String, TelephonyCredentials>,
}

impl UserSettings {
    /// Settings used when no row exists for the user yet
    #[must_use]
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            max_concurrent_calls: crate::constants::defaults::MAX_CONCURRENT_CALLS,
            telephony: HashMap::new(),
        }
    }
}

/// One row per initiated call, keyed by the voice engine's call id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistory {
    /// Voice engine call id
    pub engine_call_id: String,
    pub user_id: Uuid,
    pub agent_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub end_reason: Option<String>,
    /// Duration billed, rounded up to whole minutes
    pub billed_duration_seconds: Option<i64>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub recording_url: Option<String>,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
}

/// Terminal call event after normalization across webhook sources
#[derive(Debug, Clone)]
pub struct CallTerminated {
    pub engine_call_id: String,
    pub outcome: CallOutcome,
    /// Provider-reported talk seconds, when the source carries one
    pub duration_seconds: Option<i64>,
    pub end_reason: String,
    /// Engine-reported join instant, preferred for duration derivation
    pub joined_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub recording_url: Option<String>,
}

/// In-memory record of a call the scheduler believes is in flight
#[derive(Debug, Clone)]
pub struct ActiveCallRecord {
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Synthetic active-call key used before the engine returns a real call id
#[must_use]
pub fn pending_call_key(campaign_id: Uuid, contact_id: Uuid) -> String {
    format!("pending_{campaign_id}_{contact_id}")
}

/// Validate an E.164 phone number (`+` followed by 8 to 15 digits)
///
/// # Errors
///
/// Returns `InvalidInput` when the number is not E.164.
pub fn validate_e164(phone: &str) -> AppResult<()> {
    let digits = phone.strip_prefix('+').ok_or_else(|| {
        AppError::invalid_input(format!("phone number must be E.164, got: {phone}"))
    })?;
    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid_input(format!(
            "phone number must be E.164, got: {phone}"
        )));
    }
    Ok(())
}
