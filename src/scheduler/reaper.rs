// ABOUTME: Stale-call reaping for in-flight calls whose terminal webhook never arrived
// ABOUTME: Fails the contact, releases the slot, and closes the history row after the threshold
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Stale-call reaping
//!
//! Runs at the start of every tick. The threshold comfortably exceeds the
//! per-call maximum duration, so a healthy call never trips it; a stuck
//! one stops starving the user's budget within one threshold interval.
//! A webhook arriving after the reap finds an already-terminal history row
//! and resolves as a no-op.

use chrono::{DateTime, Duration, Utc};
use tracing::{error, warn};

use super::CampaignScheduler;
use crate::database::call_history::CallFinalization;
use crate::models::{ActiveCallRecord, CallOutcome, CallStatus};

const TIMEOUT_NOTES: &str = "call timed out";

impl CampaignScheduler {
    /// Fail every in-flight call older than the stale threshold
    pub(crate) async fn reap_stale_calls(&self, now: DateTime<Utc>) {
        let threshold = Duration::minutes(self.config().stale_call_threshold_minutes);

        let stale: Vec<(String, ActiveCallRecord)> = {
            let records = self.active_calls().lock().await;
            records
                .iter()
                .filter(|(_, record)| now - record.started_at >= threshold)
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect()
        };

        for (key, record) in stale {
            warn!(
                key = %key,
                contact_id = %record.contact_id,
                user_id = %record.user_id,
                "reaping stale call"
            );
            if let Err(e) = self.reap_one(&key, &record, now).await {
                error!(key = %key, "failed to reap stale call: {e}");
            }
        }
    }

    async fn reap_one(
        &self,
        key: &str,
        record: &ActiveCallRecord,
        now: DateTime<Utc>,
    ) -> crate::errors::AppResult<()> {
        self.remove_active_call(key).await;
        self.release_slot(record.user_id).await;

        // Close the history row so a late webhook for this call finds a
        // terminal record and changes nothing. Synthetic keys have no row;
        // the guarded update simply misses.
        let finalization = CallFinalization {
            status: CallStatus::Failed,
            ended_at: now,
            duration_seconds: None,
            end_reason: TIMEOUT_NOTES.into(),
            billed_duration_seconds: None,
            summary: None,
            short_summary: None,
            recording_url: None,
        };
        self.database()
            .call_history()
            .finalize(key, &finalization)
            .await?;

        let changed = self
            .database()
            .campaigns()
            .finish_contact(record.contact_id, CallStatus::Failed, None, Some(TIMEOUT_NOTES))
            .await?;
        if changed {
            self.database()
                .campaigns()
                .record_outcome(record.campaign_id, CallOutcome::Failed)
                .await?;
        }

        self.check_campaign_completion(record.campaign_id).await?;
        self.schedule_wake(record.user_id);
        Ok(())
    }
}
