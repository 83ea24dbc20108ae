// ABOUTME: Call initiation for claimed contacts across the voice engine and telephony bridge
// ABOUTME: Validates configuration, acquires the budget slot, creates the session, dials the bridge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Call initiation
//!
//! Given a freshly claimed contact, produce a real call or fail the
//! contact. The budget slot is acquired before the engine call because the
//! engine session is billable from creation; the slot is released only by
//! the webhook reducer or the stale-call reaper, except when initiation
//! itself fails.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::budget::UserBudget;
use super::CampaignScheduler;
use crate::database::call_history::CallFinalization;
use crate::engine::{CallMedium, CreateCallRequest};
use crate::errors::AppResult;
use crate::models::{
    pending_call_key, validate_e164, ActiveCallRecord, CallHistory, CallOutcome, CallStatus,
    Campaign, Contact, OutboundMedium, TelephonyCredentials,
};
use crate::providers::BridgeTags;

impl CampaignScheduler {
    /// Turn a claimed contact into a live call, or fail the contact
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures; configuration and external
    /// failures are absorbed into the contact's terminal state.
    pub(crate) async fn initiate_call(
        &self,
        campaign: &Campaign,
        contact: &Contact,
        budget: &Arc<Mutex<UserBudget>>,
    ) -> AppResult<()> {
        // Step 1: configuration checks. Failures here never consume a slot.
        let (medium, credentials) = match self.validate_call_config(campaign, contact).await {
            Ok(valid) => valid,
            Err(reason) => {
                warn!(
                    campaign_id = %campaign.id,
                    contact_id = %contact.id,
                    "refusing to dial: {reason}"
                );
                self.fail_contact_without_slot(campaign, contact.id, &reason)
                    .await?;
                return Ok(());
            }
        };

        // Step 2: take the slot and record the in-flight call under a
        // synthetic key until the engine returns a real id.
        budget.lock().await.acquire();
        let synthetic_key = pending_call_key(campaign.id, contact.id);
        self.insert_active_call(
            synthetic_key.clone(),
            ActiveCallRecord {
                contact_id: contact.id,
                campaign_id: campaign.id,
                user_id: campaign.user_id,
                started_at: Utc::now(),
            },
        )
        .await;

        // Step 3: create the engine session. `incoming: true` makes the
        // engine wait for our bridge instead of dialing anyone itself.
        let request = CreateCallRequest {
            agent_id: campaign.agent_id.clone(),
            medium: CallMedium {
                provider: medium.provider.clone(),
                incoming: true,
            },
            max_duration_seconds: self.config().call_max_duration_seconds,
            recording_enabled: true,
            correlation_tags: HashMap::from([
                ("campaignId".to_owned(), campaign.id.to_string()),
                ("contactId".to_owned(), contact.id.to_string()),
            ]),
        };

        let engine_call = match self.engine().create_call(&request).await {
            Ok(call) => call,
            Err(e) => {
                self.abort_initiation(campaign, contact.id, &synthetic_key, None, &e.to_string())
                    .await?;
                return Ok(());
            }
        };

        // Step 4: re-key the in-flight record, persist the history row, and
        // bridge the real call into the session.
        if let Some(record) = self.remove_active_call(&synthetic_key).await {
            self.insert_active_call(engine_call.call_id.clone(), record)
                .await;
        }

        let history = CallHistory {
            engine_call_id: engine_call.call_id.clone(),
            user_id: campaign.user_id,
            agent_id: campaign.agent_id.clone(),
            customer_name: contact.name.clone(),
            customer_phone: contact.phone_number.clone(),
            status: CallStatus::InProgress,
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
            end_reason: None,
            billed_duration_seconds: None,
            summary: None,
            short_summary: None,
            recording_url: None,
            campaign_id: campaign.id,
            contact_id: contact.id,
        };

        if let Err(e) = self.database().call_history().insert(&history).await {
            self.abort_initiation(
                campaign,
                contact.id,
                &engine_call.call_id,
                Some(&engine_call.call_id),
                &e.to_string(),
            )
            .await?;
            return Ok(());
        }

        if let Err(e) = self
            .database()
            .campaigns()
            .set_contact_call_refs(contact.id, &engine_call.call_id, &engine_call.call_id)
            .await
        {
            self.abort_initiation(
                campaign,
                contact.id,
                &engine_call.call_id,
                Some(&engine_call.call_id),
                &e.to_string(),
            )
            .await?;
            return Ok(());
        }

        let tags = BridgeTags {
            campaign_id: campaign.id,
            contact_id: contact.id,
            call_history_id: engine_call.call_id.clone(),
        };

        match self
            .telephony()
            .bridge(
                &medium.provider,
                &credentials,
                &medium.from_phone,
                &contact.phone_number,
                &engine_call.join_url,
                &tags,
            )
            .await
        {
            Ok(provider_call_id) => {
                info!(
                    campaign_id = %campaign.id,
                    contact_id = %contact.id,
                    engine_call_id = %engine_call.call_id,
                    provider_call_id = %provider_call_id,
                    "outbound call bridged"
                );
                Ok(())
            }
            Err(e) => {
                self.abort_initiation(
                    campaign,
                    contact.id,
                    &engine_call.call_id,
                    Some(&engine_call.call_id),
                    &format!("telephony bridge failed: {e}"),
                )
                .await?;
                Ok(())
            }
        }
    }

    /// Validate medium, credentials, and agent before any billable action
    async fn validate_call_config(
        &self,
        campaign: &Campaign,
        contact: &Contact,
    ) -> Result<(OutboundMedium, TelephonyCredentials), String> {
        let Some(medium) = campaign.outbound_medium.clone() else {
            return Err("campaign has no outbound medium configured".into());
        };
        if medium.provider.is_empty() || medium.from_phone.is_empty() {
            return Err("campaign outbound medium is incomplete".into());
        }
        if campaign.agent_id.is_empty() {
            return Err("campaign has no agent assigned".into());
        }
        if let Err(e) = validate_e164(&contact.phone_number) {
            return Err(e.to_string());
        }

        let settings = self
            .database()
            .user_settings()
            .get(campaign.user_id)
            .await
            .map_err(|e| format!("failed to load user settings: {e}"))?;

        let Some(credentials) = settings.telephony.get(&medium.provider).cloned() else {
            return Err(format!(
                "user has no credentials for provider {}",
                medium.provider
            ));
        };

        Ok((medium, credentials))
    }

    /// Fail a contact before a slot was taken (configuration errors)
    async fn fail_contact_without_slot(
        &self,
        campaign: &Campaign,
        contact_id: Uuid,
        notes: &str,
    ) -> AppResult<()> {
        let changed = self
            .database()
            .campaigns()
            .finish_contact(contact_id, CallStatus::Failed, None, Some(notes))
            .await?;
        if changed {
            self.database()
                .campaigns()
                .record_outcome(campaign.id, CallOutcome::Failed)
                .await?;
        }
        self.check_campaign_completion(campaign.id).await
    }

    /// Unwind a partially initiated call: release the slot, drop the
    /// in-flight record, fail the contact, and close any history row
    async fn abort_initiation(
        &self,
        campaign: &Campaign,
        contact_id: Uuid,
        active_call_key: &str,
        engine_call_id: Option<&str>,
        notes: &str,
    ) -> AppResult<()> {
        warn!(
            campaign_id = %campaign.id,
            contact_id = %contact_id,
            "call initiation aborted: {notes}"
        );

        self.remove_active_call(active_call_key).await;
        self.release_slot(campaign.user_id).await;

        if let Some(engine_call_id) = engine_call_id {
            let finalization = CallFinalization {
                status: CallStatus::Failed,
                ended_at: Utc::now(),
                duration_seconds: None,
                end_reason: "initiation-failed".into(),
                billed_duration_seconds: None,
                summary: None,
                short_summary: None,
                recording_url: None,
            };
            self.database()
                .call_history()
                .finalize(engine_call_id, &finalization)
                .await?;
        }

        let changed = self
            .database()
            .campaigns()
            .finish_contact(contact_id, CallStatus::Failed, None, Some(notes))
            .await?;
        if changed {
            self.database()
                .campaigns()
                .record_outcome(campaign.id, CallOutcome::Failed)
                .await?;
        }
        self.check_campaign_completion(campaign.id).await
    }
}
