// ABOUTME: Webhook reduction applying terminal call events from engine and telephony sources
// ABOUTME: Idempotent on engine call id so duplicate and late webhooks cannot corrupt state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Webhook reduction
//!
//! Terminal events arrive from three channels: the voice engine, each
//! telephony provider's leg status callback, and provider hangup events.
//! All are projected onto one normalized `CallTerminated` and applied here.
//!
//! Every step is idempotent on the engine call id. The call-history row's
//! `in-progress` guard decides whether this event is the first terminal
//! one; only the first releases the budget slot and counts toward campaign
//! totals. Duplicates and events for unknown calls change nothing.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::CampaignScheduler;
use crate::constants::billing;
use crate::database::call_history::CallFinalization;
use crate::errors::AppResult;
use crate::models::{pending_call_key, CallOutcome, CallTerminated};

/// Leg status callback from a telephony provider, already flattened from
/// the provider's wire shape
#[derive(Debug, Clone)]
pub struct TelephonyStatusEvent {
    /// Provider tag the event arrived from
    pub provider: String,
    /// Engine call id, carried as `callHistoryId` in the callback URL
    pub engine_call_id: String,
    /// Provider status string (`completed`, `busy`, `no-answer`, ...)
    pub status: String,
    /// Provider-reported talk seconds when present
    pub duration_seconds: Option<i64>,
}

/// Map a telephony status to a normalized outcome
///
/// Returns `None` for non-terminal leg states (`ringing`, `in-progress`,
/// `initiated`, `answered`). A `completed` leg that never accumulated talk
/// time is an unanswered dial.
#[must_use]
pub fn normalize_telephony_status(status: &str, duration_seconds: Option<i64>) -> Option<CallOutcome> {
    match status {
        "completed" => {
            if duration_seconds.unwrap_or(0) > 0 {
                Some(CallOutcome::Completed)
            } else {
                Some(CallOutcome::NoAnswer)
            }
        }
        "busy" | "canceled" | "cancel" | "failed" | "machine" => Some(CallOutcome::Failed),
        "no-answer" | "timeout" => Some(CallOutcome::NoAnswer),
        _ => None,
    }
}

impl CampaignScheduler {
    /// Apply a telephony leg status callback
    ///
    /// Non-terminal statuses are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures.
    pub async fn handle_telephony_status(&self, event: &TelephonyStatusEvent) -> AppResult<()> {
        let Some(outcome) = normalize_telephony_status(&event.status, event.duration_seconds)
        else {
            debug!(
                provider = %event.provider,
                status = %event.status,
                "ignoring non-terminal telephony status"
            );
            return Ok(());
        };

        let terminated = CallTerminated {
            engine_call_id: event.engine_call_id.clone(),
            outcome,
            duration_seconds: event.duration_seconds,
            end_reason: event.status.clone(),
            joined_at: None,
            ended_at: None,
            summary: None,
            short_summary: None,
            recording_url: None,
        };
        self.handle_call_terminated(&terminated).await
    }

    /// Apply a normalized terminal event
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures; unknown call ids and
    /// duplicate events resolve to logged no-ops.
    pub async fn handle_call_terminated(&self, event: &CallTerminated) -> AppResult<()> {
        let Some(history) = self
            .database()
            .call_history()
            .get(&event.engine_call_id)
            .await?
        else {
            warn!(
                engine_call_id = %event.engine_call_id,
                "terminal webhook for unknown call, ignoring"
            );
            return Ok(());
        };

        // Prefer the engine's joined/ended instants for talk time; fall
        // back to whatever seconds the source reported.
        let duration_seconds = match (event.joined_at, event.ended_at) {
            (Some(joined), Some(ended)) => Some((ended - joined).num_seconds().max(0)),
            _ => event.duration_seconds,
        };
        let billed_duration_seconds = duration_seconds
            .filter(|d| *d > 0)
            .map(|d| ((d + 59) / 60 * 60).max(billing::MINIMUM_BILLED_SECONDS));

        let finalization = CallFinalization {
            status: event.outcome.call_status(),
            ended_at: event.ended_at.unwrap_or_else(Utc::now),
            duration_seconds,
            end_reason: event.end_reason.clone(),
            billed_duration_seconds,
            summary: event.summary.clone(),
            short_summary: event.short_summary.clone(),
            recording_url: event.recording_url.clone(),
        };

        let first_terminal = self
            .database()
            .call_history()
            .finalize(&event.engine_call_id, &finalization)
            .await?;

        // Drop the in-flight record under the real id, or under the
        // synthetic key if the engine never echoed an id back.
        if self.remove_active_call(&event.engine_call_id).await.is_none() {
            let fallback = pending_call_key(history.campaign_id, history.contact_id);
            self.remove_active_call(&fallback).await;
        }

        if !first_terminal {
            debug!(
                engine_call_id = %event.engine_call_id,
                "duplicate terminal webhook, no state change"
            );
            return Ok(());
        }

        info!(
            engine_call_id = %event.engine_call_id,
            outcome = ?event.outcome,
            duration_seconds = ?duration_seconds,
            "call terminated"
        );

        // Contact transition, guarded on in-progress for monotonicity.
        let requeue_busy =
            self.config().retry_busy && event.end_reason == "busy";
        let contact_changed = if requeue_busy {
            self.database()
                .campaigns()
                .requeue_contact(history.contact_id, "requeued after busy")
                .await?
        } else {
            self.database()
                .campaigns()
                .finish_contact(
                    history.contact_id,
                    event.outcome.call_status(),
                    duration_seconds,
                    Some(&event.end_reason),
                )
                .await?
        };

        if contact_changed && !requeue_busy {
            self.database()
                .campaigns()
                .record_outcome(history.campaign_id, event.outcome)
                .await?;
        }

        self.release_slot(history.user_id).await;
        self.check_campaign_completion(history.campaign_id).await?;

        // Dial the next contact without waiting for the next tick.
        self.schedule_wake(history.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_terminal_statuses() {
        assert_eq!(
            normalize_telephony_status("completed", Some(42)),
            Some(CallOutcome::Completed)
        );
        assert_eq!(
            normalize_telephony_status("completed", Some(0)),
            Some(CallOutcome::NoAnswer)
        );
        assert_eq!(
            normalize_telephony_status("completed", None),
            Some(CallOutcome::NoAnswer)
        );
        for status in ["busy", "canceled", "cancel", "failed", "machine"] {
            assert_eq!(
                normalize_telephony_status(status, None),
                Some(CallOutcome::Failed),
                "status {status}"
            );
        }
        for status in ["no-answer", "timeout"] {
            assert_eq!(
                normalize_telephony_status(status, None),
                Some(CallOutcome::NoAnswer),
                "status {status}"
            );
        }
    }

    #[test]
    fn test_normalize_ignores_lifecycle_statuses() {
        for status in ["ringing", "in-progress", "initiated", "answered", "queued"] {
            assert_eq!(normalize_telephony_status(status, None), None, "status {status}");
        }
    }
}
