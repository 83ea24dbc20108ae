// ABOUTME: Administrative operations on campaigns and user call state
// ABOUTME: Start-now, pause, resume, state reset, instant calls, and read-only introspection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Administrative operations
//!
//! All operations mutate durable state first and then update or invalidate
//! the in-memory caches. Pausing never recalls in-flight calls; they drain
//! naturally through the webhook path and release their slots there.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{window, BudgetView, CampaignScheduler};
use crate::database::CampaignSummary;
use crate::errors::{AppError, AppResult};
use crate::models::{Campaign, CampaignStatus, CampaignType};

/// A parked campaign eligible for resumption, annotated with whether the
/// current time falls inside its daily window
#[derive(Debug, Clone, Serialize)]
pub struct ResumableCampaign {
    pub campaign_id: Uuid,
    pub name: String,
    pub pending: i64,
    pub paused_reason: Option<String>,
    pub in_window_now: bool,
}

/// One in-flight call as seen by the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCallView {
    pub key: String,
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Read-only snapshot of the in-memory scheduler state
#[derive(Debug, Clone, Serialize)]
pub struct CallStateSnapshot {
    pub budgets: Vec<BudgetView>,
    pub active_calls: Vec<ActiveCallView>,
}

impl CampaignScheduler {
    /// Start a scheduled or draft outbound campaign immediately
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the campaign is an outbound campaign
    /// in `draft` or `scheduled` status.
    pub async fn start_now(&self, campaign_id: Uuid) -> AppResult<()> {
        let campaign = self.require_campaign(campaign_id).await?;

        if campaign.campaign_type != CampaignType::Outbound {
            return Err(AppError::invalid_state(
                "only outbound campaigns can be started",
            ));
        }
        if !matches!(
            campaign.status,
            CampaignStatus::Draft | CampaignStatus::Scheduled
        ) {
            return Err(AppError::invalid_state(format!(
                "campaign in status {} cannot be started",
                campaign.status
            )));
        }

        info!(campaign_id = %campaign_id, "starting campaign now");
        self.database()
            .campaigns()
            .activate(campaign_id, Utc::now())
            .await?;

        let budget = self.budget_entry(campaign.user_id).await?;
        budget.lock().await.add_campaign(campaign_id);

        self.process_user_calls(campaign.user_id).await
    }

    /// Pause an active campaign
    ///
    /// In-flight calls are not cancelled; they terminate through the
    /// webhook path and release their slots there.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the campaign is active.
    pub async fn pause(&self, campaign_id: Uuid) -> AppResult<()> {
        let campaign = self.require_campaign(campaign_id).await?;

        if campaign.status != CampaignStatus::Active {
            return Err(AppError::invalid_state(format!(
                "campaign in status {} cannot be paused",
                campaign.status
            )));
        }

        info!(campaign_id = %campaign_id, "pausing campaign");
        self.database()
            .campaigns()
            .set_status(campaign_id, CampaignStatus::Paused)
            .await?;
        self.remove_campaign_from_budget(campaign.user_id, campaign_id)
            .await;
        Ok(())
    }

    /// Resume a paused or window-parked campaign
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the campaign is paused.
    pub async fn resume(&self, campaign_id: Uuid) -> AppResult<()> {
        let campaign = self.require_campaign(campaign_id).await?;

        if !matches!(
            campaign.status,
            CampaignStatus::Paused | CampaignStatus::PausedTimeWindow
        ) {
            return Err(AppError::invalid_state(format!(
                "campaign in status {} cannot be resumed",
                campaign.status
            )));
        }

        info!(campaign_id = %campaign_id, "resuming campaign");
        self.database()
            .campaigns()
            .activate(campaign_id, Utc::now())
            .await?;

        let budget = self.budget_entry(campaign.user_id).await?;
        budget.lock().await.add_campaign(campaign_id);

        self.process_user_calls(campaign.user_id).await
    }

    /// Clear a user's stuck call state after webhook loss
    ///
    /// Zeroes the budget counter, drops the user's in-flight records, and
    /// fails every in-progress contact. Returns the number of contacts
    /// transitioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store update fails.
    pub async fn reset_user_call_state(&self, user_id: Uuid) -> AppResult<u64> {
        if let Some(budget) = self.budgets().get(user_id).await {
            budget.lock().await.active_calls = 0;
        }

        {
            let mut records = self.active_calls().lock().await;
            records.retain(|_, record| record.user_id != user_id);
        }

        let reset = self
            .database()
            .campaigns()
            .reset_in_progress_for_user(user_id, "reset due to manual state clear")
            .await?;

        info!(user_id = %user_id, reset, "user call state reset");
        Ok(reset)
    }

    /// List window-parked campaigns with pending work, annotated with
    /// whether the current time falls inside each daily window
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn resumable_campaigns(&self, user_id: Uuid) -> AppResult<Vec<ResumableCampaign>> {
        let now = Utc::now();
        let parked = self
            .database()
            .campaigns()
            .list_by_user_and_status(user_id, CampaignStatus::PausedTimeWindow)
            .await?;

        let mut out = Vec::new();
        for campaign in parked {
            let counts = self.database().campaigns().contact_counts(campaign.id).await?;
            if counts.pending == 0 {
                continue;
            }
            let in_window_now = campaign
                .schedule
                .as_ref()
                .is_some_and(|s| window::can_resume_in_window(s, now));
            out.push(ResumableCampaign {
                campaign_id: campaign.id,
                name: campaign.name,
                pending: counts.pending,
                paused_reason: campaign.paused_reason,
                in_window_now,
            });
        }
        Ok(out)
    }

    /// Per-campaign contact tallies for the user's outbound campaigns
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn pending_contacts_summary(&self, user_id: Uuid) -> AppResult<Vec<CampaignSummary>> {
        self.database().campaigns().summaries_for_user(user_id).await
    }

    /// Read-only snapshot of budgets and in-flight calls
    pub async fn call_state(&self) -> CallStateSnapshot {
        let budgets = self.budgets().snapshot().await;
        let active_calls = self
            .active_calls()
            .lock()
            .await
            .iter()
            .map(|(key, record)| ActiveCallView {
                key: key.clone(),
                contact_id: record.contact_id,
                campaign_id: record.campaign_id,
                user_id: record.user_id,
                started_at: record.started_at,
            })
            .collect();

        CallStateSnapshot {
            budgets,
            active_calls,
        }
    }

    /// Dial one contact immediately, bypassing the tick but not the budget
    ///
    /// The processing latch is taken so slot acquisition stays serialized
    /// with the scheduler's own passes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when the campaign cannot be dialed, the user
    /// is mid-pass, or the budget is exhausted; `ResourceNotFound` when no
    /// pending contact remains.
    pub async fn instant_call(&self, campaign_id: Uuid) -> AppResult<Uuid> {
        let campaign = self.require_campaign(campaign_id).await?;

        if campaign.campaign_type == CampaignType::Inbound {
            return Err(AppError::invalid_state(
                "inbound campaigns cannot place outbound calls",
            ));
        }
        if campaign.status == CampaignStatus::Completed {
            return Err(AppError::invalid_state("campaign is already completed"));
        }

        let budget = self.budget_entry(campaign.user_id).await?;
        {
            let mut b = budget.lock().await;
            if b.is_processing {
                return Err(AppError::new(
                    crate::errors::ErrorCode::ResourceLocked,
                    "user processing pass in flight, retry shortly",
                ));
            }
            b.is_processing = true;
        }

        let result = self.instant_call_under_latch(&campaign, &budget).await;
        budget.lock().await.is_processing = false;
        result
    }

    async fn instant_call_under_latch(
        &self,
        campaign: &Campaign,
        budget: &std::sync::Arc<tokio::sync::Mutex<super::UserBudget>>,
    ) -> AppResult<Uuid> {
        let settings = self
            .database()
            .user_settings()
            .get(campaign.user_id)
            .await?;
        {
            let mut b = budget.lock().await;
            b.max_concurrent_calls = settings.max_concurrent_calls;
            if b.available() == 0 {
                return Err(AppError::invalid_state(
                    "concurrent call budget exhausted",
                ));
            }
        }

        let Some(contact) = self
            .database()
            .campaigns()
            .claim_pending_contact(campaign.id)
            .await?
        else {
            return Err(AppError::not_found("pending contact"));
        };

        let contact_id = contact.id;
        self.initiate_call(campaign, &contact, budget).await?;
        Ok(contact_id)
    }

    async fn require_campaign(&self, campaign_id: Uuid) -> AppResult<Campaign> {
        self.database()
            .campaigns()
            .get(campaign_id)
            .await?
            .ok_or_else(|| AppError::not_found("campaign"))
    }
}
