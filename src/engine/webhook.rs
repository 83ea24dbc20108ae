// ABOUTME: Voice engine webhook payloads, signature verification, and event normalization
// ABOUTME: Validates HMAC-SHA256 body signatures and projects terminal events onto CallTerminated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Engine webhook handling
//!
//! The engine posts lifecycle events (`call.started`, `call.joined`,
//! `call.ended`, `call.billed`). When a signing secret is configured every
//! request carries an HMAC-SHA256 of the raw body in the
//! `x-herald-signature` header; a mismatch is rejected before any state
//! change.

use chrono::{DateTime, Utc};
use ring::hmac;
use serde::Deserialize;

use crate::models::{CallOutcome, CallTerminated};

/// Webhook signature validation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureValidation {
    /// Signature is valid
    Valid,
    /// Signature is invalid
    Invalid,
    /// Signature header is missing
    Missing,
    /// No signing secret configured; validation cannot be performed
    NotConfigured,
}

/// Validates engine webhook signatures
///
/// Holds the optional signing secret, so the "no secret configured" policy
/// lives here rather than at every call site.
pub struct WebhookSignatureValidator {
    signing_secret: Option<String>,
}

impl WebhookSignatureValidator {
    #[must_use]
    pub const fn new(signing_secret: Option<String>) -> Self {
        Self { signing_secret }
    }

    /// Validate a webhook request signature against the raw body
    #[must_use]
    pub fn validate(&self, signature_header: Option<&str>, body: &[u8]) -> SignatureValidation {
        let Some(secret) = &self.signing_secret else {
            return SignatureValidation::NotConfigured;
        };
        let Some(signature) = signature_header else {
            return SignatureValidation::Missing;
        };

        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hmac::sign(&key, body);
        let expected = hex::encode(tag.as_ref());

        // Constant-time comparison to prevent timing attacks
        if subtle::ConstantTimeEq::ct_eq(signature.as_bytes(), expected.as_bytes()).into() {
            SignatureValidation::Valid
        } else {
            SignatureValidation::Invalid
        }
    }
}

/// Lifecycle event posted by the voice engine
#[derive(Debug, Clone, Deserialize)]
pub struct EngineWebhookEvent {
    /// Event name: `call.started`, `call.joined`, `call.ended`, `call.billed`
    pub event: String,
    pub call_id: String,
    pub end_reason: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub recording_url: Option<String>,
}

impl EngineWebhookEvent {
    /// Whether this event terminates the call
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.event.as_str(), "call.ended" | "call.billed")
    }

    /// Project a terminal engine event onto the normalized form
    ///
    /// Returns `None` for lifecycle events (`call.started`, `call.joined`).
    #[must_use]
    pub fn normalize(&self) -> Option<CallTerminated> {
        if !self.is_terminal() {
            return None;
        }

        let end_reason = self.end_reason.clone().unwrap_or_else(|| "unknown".into());
        let outcome = outcome_from_end_reason(&end_reason);

        Some(CallTerminated {
            engine_call_id: self.call_id.clone(),
            outcome,
            duration_seconds: self.duration_seconds,
            end_reason,
            joined_at: self.joined_at,
            ended_at: self.ended_at,
            summary: self.summary.clone(),
            short_summary: self.short_summary.clone(),
            recording_url: self.recording_url.clone(),
        })
    }
}

/// Map the engine's end reason to a normalized outcome
///
/// Unrecognized reasons are treated as failures so the slot is always
/// released.
fn outcome_from_end_reason(end_reason: &str) -> CallOutcome {
    match end_reason {
        "hangup" | "agent_hangup" => CallOutcome::Completed,
        "unjoined" | "timeout" => CallOutcome::NoAnswer,
        _ => CallOutcome::Failed,
    }
}
