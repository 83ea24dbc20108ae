// ABOUTME: Voice engine integration for creating AI call sessions and managing webhooks
// ABOUTME: Defines the engine contract the scheduler dials through, plus its wire types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! # Voice Engine Integration
//!
//! The voice engine hosts the AI agent sessions. The scheduler creates a
//! session with `incoming: true`, which makes the engine allocate a join
//! URL without dialing anyone; the telephony provider then bridges a real
//! outbound call into that session. Keeping the dial on our side keeps
//! provider behavior (status callbacks, machine detection, billing) visible
//! to the scheduler.

pub mod client;
pub mod webhook;

pub use client::VoiceEngineClient;
pub use webhook::{EngineWebhookEvent, SignatureValidation, WebhookSignatureValidator};

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

/// Transport configuration for an engine session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMedium {
    /// Telephony provider tag that will stream into the session
    pub provider: String,
    /// When true the engine allocates a join URL and waits for the bridge
    pub incoming: bool,
}

/// Request to create an engine call session
#[derive(Debug, Clone, Serialize)]
pub struct CreateCallRequest {
    pub agent_id: String,
    pub medium: CallMedium,
    pub max_duration_seconds: u32,
    pub recording_enabled: bool,
    /// Correlation tags echoed back on engine webhooks (campaign and contact ids)
    pub correlation_tags: HashMap<String, String>,
}

/// Engine response to a successful call creation
#[derive(Debug, Clone, Deserialize)]
pub struct EngineCall {
    /// Opaque engine call id; keys the call-history row
    pub call_id: String,
    /// Transport URL the telephony provider streams audio into
    pub join_url: String,
}

/// Timing, billing, and summary details for a finished call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineCallDetails {
    pub joined_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<i64>,
    pub billed_duration_seconds: Option<i64>,
    pub end_reason: Option<String>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub recording_url: Option<String>,
}

/// Request to register a webhook with the engine
#[derive(Debug, Clone, Serialize)]
pub struct CreateWebhookRequest {
    pub url: String,
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Registered engine webhook
#[derive(Debug, Clone, Deserialize)]
pub struct EngineWebhook {
    pub webhook_id: String,
}

/// Contract between the scheduler and the voice engine
///
/// The production implementation is [`VoiceEngineClient`]; tests substitute
/// their own.
#[async_trait]
pub trait VoiceEngine: Send + Sync {
    /// Create a call session and return its id and join URL
    async fn create_call(&self, request: &CreateCallRequest) -> AppResult<EngineCall>;

    /// Fetch timing, billing, and summary details for a call
    async fn get_call_details(&self, call_id: &str) -> AppResult<EngineCallDetails>;

    /// Register a webhook endpoint for engine events
    async fn create_webhook(&self, request: &CreateWebhookRequest) -> AppResult<EngineWebhook>;

    /// Remove a registered webhook
    async fn delete_webhook(&self, webhook_id: &str) -> AppResult<()>;
}
