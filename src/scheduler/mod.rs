// ABOUTME: Campaign scheduler and call-slot orchestrator driving all outbound dialing
// ABOUTME: Periodic tick opens and closes windows, claims contacts, and fans out per-user work
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! # Campaign Scheduler
//!
//! The scheduler is a long-lived object constructed at startup. A background
//! ticker fires every thirty seconds; each tick reaps stale calls, opens
//! windows that became due, resumes parked campaigns whose daily window
//! reopened, parks or completes campaigns whose window closed, and fans out
//! per-user processing.
//!
//! `process_user_calls` is the inner hot loop: under the user's processing
//! latch it repeatedly claims one pending contact per active campaign in
//! round-robin order and hands each claim to the call initiator, until the
//! user's slot budget is exhausted or no campaign has pending work.
//!
//! All in-memory state (budgets, active-call records) is a cache over the
//! database and is rebuilt on first touch of a user after process start.

pub mod admin;
pub mod budget;
pub mod initiator;
pub mod reaper;
pub mod reducer;
pub mod window;

pub use admin::{ActiveCallView, CallStateSnapshot, ResumableCampaign};
pub use budget::{BudgetRegistry, BudgetView, UserBudget};

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::database::Database;
use crate::engine::VoiceEngine;
use crate::errors::AppResult;
use crate::models::{ActiveCallRecord, Campaign, CampaignStatus};
use crate::providers::TelephonyGateway;

/// The campaign scheduler and call-slot orchestrator
pub struct CampaignScheduler {
    database: Arc<Database>,
    engine: Arc<dyn VoiceEngine>,
    telephony: Arc<dyn TelephonyGateway>,
    config: SchedulerConfig,
    budgets: BudgetRegistry,
    /// In-flight calls keyed by engine call id (or a synthetic key before
    /// the engine returns one)
    active_calls: Mutex<HashMap<String, ActiveCallRecord>>,
    ticker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
    me: Weak<Self>,
}

impl CampaignScheduler {
    /// Construct the scheduler
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        engine: Arc<dyn VoiceEngine>,
        telephony: Arc<dyn TelephonyGateway>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            database,
            engine,
            telephony,
            config,
            budgets: BudgetRegistry::new(),
            active_calls: Mutex::new(HashMap::new()),
            ticker: Mutex::new(None),
            me: me.clone(),
        })
    }

    /// Start the background ticker
    pub async fn start(&self) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            warn!("scheduler already started");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let Some(scheduler) = self.me.upgrade() else {
            return;
        };
        let interval_seconds = self.config.tick_interval_seconds;

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.run_tick().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("scheduler ticker stopping");
                        break;
                    }
                }
            }
        });

        *ticker = Some((shutdown_tx, handle));
        info!(interval_seconds, "scheduler started");
    }

    /// Stop the background ticker and wait for the current tick to finish
    pub async fn stop(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some((shutdown_tx, handle)) = ticker {
            let _ = shutdown_tx.send(true);
            let _ = handle.await;
            info!("scheduler stopped");
        }
    }

    /// One tick at the current wall time, errors logged and swallowed
    pub async fn run_tick(&self) {
        if let Err(e) = self.tick_at(Utc::now()).await {
            error!("scheduler tick failed: {e}");
        }
    }

    /// One tick at an explicit instant
    ///
    /// Stage order matters: reaping first frees slots the fan-out can use
    /// in the same tick.
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level failures scanning campaigns;
    /// per-campaign and per-user failures are logged and swallowed so one
    /// user cannot break the loop for all users.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> AppResult<()> {
        self.reap_stale_calls(now).await;
        self.start_due_campaigns(now).await?;
        self.resume_parked_campaigns(now).await?;
        self.stop_closed_campaigns(now).await?;
        self.fan_out_processing().await?;
        Ok(())
    }

    /// Open windows for scheduled campaigns that became due
    async fn start_due_campaigns(&self, now: DateTime<Utc>) -> AppResult<()> {
        let scheduled = self
            .database
            .campaigns()
            .list_by_status(CampaignStatus::Scheduled)
            .await?;

        for campaign in scheduled {
            if !campaign.is_dialable() {
                continue;
            }
            let Some(schedule) = &campaign.schedule else {
                continue;
            };
            if !window::should_start(schedule, now) {
                continue;
            }

            info!(campaign_id = %campaign.id, user_id = %campaign.user_id, "campaign window opened");
            if let Err(e) = self.activate_campaign(&campaign, now).await {
                error!(campaign_id = %campaign.id, "failed to start campaign: {e}");
            }
        }
        Ok(())
    }

    /// Resume parked campaigns whose daily window reopened
    async fn resume_parked_campaigns(&self, now: DateTime<Utc>) -> AppResult<()> {
        let parked = self
            .database
            .campaigns()
            .list_by_status(CampaignStatus::PausedTimeWindow)
            .await?;

        for campaign in parked {
            if !campaign.is_dialable() {
                continue;
            }
            let Some(schedule) = &campaign.schedule else {
                continue;
            };
            if !window::can_resume_in_window(schedule, now) {
                continue;
            }

            let counts = match self.database.campaigns().contact_counts(campaign.id).await {
                Ok(counts) => counts,
                Err(e) => {
                    error!(campaign_id = %campaign.id, "failed to count contacts: {e}");
                    continue;
                }
            };
            if counts.pending == 0 {
                continue;
            }

            info!(
                campaign_id = %campaign.id,
                pending = counts.pending,
                "campaign window reopened, resuming"
            );
            if let Err(e) = self.activate_campaign(&campaign, now).await {
                error!(campaign_id = %campaign.id, "failed to resume campaign: {e}");
            }
        }
        Ok(())
    }

    /// Park or complete active campaigns whose window closed
    async fn stop_closed_campaigns(&self, now: DateTime<Utc>) -> AppResult<()> {
        let active = self
            .database
            .campaigns()
            .list_by_status(CampaignStatus::Active)
            .await?;

        for campaign in active {
            if !campaign.is_dialable() {
                continue;
            }
            let Some(schedule) = &campaign.schedule else {
                continue;
            };
            if !window::should_stop(schedule, now) {
                continue;
            }

            if let Err(e) = self.wind_down_campaign(&campaign, now).await {
                error!(campaign_id = %campaign.id, "failed to wind down campaign: {e}");
            }
        }
        Ok(())
    }

    async fn wind_down_campaign(&self, campaign: &Campaign, now: DateTime<Utc>) -> AppResult<()> {
        let counts = self.database.campaigns().contact_counts(campaign.id).await?;

        if counts.pending > 0 {
            info!(
                campaign_id = %campaign.id,
                pending = counts.pending,
                "window closed with pending work, parking campaign"
            );
            self.database
                .campaigns()
                .park(campaign.id, "end-time-reached", now)
                .await?;
            self.remove_campaign_from_budget(campaign.user_id, campaign.id)
                .await;
        } else if counts.in_progress == 0 {
            info!(campaign_id = %campaign.id, "window closed with all work done, completing");
            self.database.campaigns().complete(campaign.id, now).await?;
            self.remove_campaign_from_budget(campaign.user_id, campaign.id)
                .await;
        } else {
            // Nothing left to dial but calls are still in flight; the
            // webhook path completes the campaign once they drain.
            debug!(
                campaign_id = %campaign.id,
                in_progress = counts.in_progress,
                "window closed, waiting for in-flight calls to drain"
            );
        }
        Ok(())
    }

    /// Process every user who still has an active outbound campaign
    async fn fan_out_processing(&self) -> AppResult<()> {
        let active = self
            .database
            .campaigns()
            .list_by_status(CampaignStatus::Active)
            .await?;

        let mut users: Vec<Uuid> = active
            .iter()
            .filter(|c| c.is_dialable())
            .map(|c| c.user_id)
            .collect();
        users.sort();
        users.dedup();

        for user_id in users {
            if let Err(e) = self.process_user_calls(user_id).await {
                error!(user_id = %user_id, "processing failed: {e}");
            }
        }
        Ok(())
    }

    /// Mark a campaign active and immediately dial into it
    async fn activate_campaign(&self, campaign: &Campaign, now: DateTime<Utc>) -> AppResult<()> {
        self.database.campaigns().activate(campaign.id, now).await?;

        let budget = self.budget_entry(campaign.user_id).await?;
        budget.lock().await.add_campaign(campaign.id);

        self.process_user_calls(campaign.user_id).await
    }

    /// Dial for one user until the budget is exhausted or no pending work remains
    ///
    /// Re-entry for a user already being processed returns immediately; the
    /// latch is the per-user mutex of the whole pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the budget cannot be rebuilt from the store.
    pub async fn process_user_calls(&self, user_id: Uuid) -> AppResult<()> {
        let budget = self.budget_entry(user_id).await?;

        {
            let mut b = budget.lock().await;
            if b.is_processing {
                debug!(user_id = %user_id, "processing already in flight, skipping");
                return Ok(());
            }
            b.is_processing = true;
        }

        let result = self.process_user_calls_under_latch(user_id, &budget).await;
        budget.lock().await.is_processing = false;
        result
    }

    async fn process_user_calls_under_latch(
        &self,
        user_id: Uuid,
        budget: &Arc<Mutex<UserBudget>>,
    ) -> AppResult<()> {
        // Refresh the cap so operator changes apply without restart
        let settings = self.database.user_settings().get(user_id).await?;
        {
            let mut b = budget.lock().await;
            b.max_concurrent_calls = settings.max_concurrent_calls;
        }

        loop {
            let (available, rotation) = {
                let b = budget.lock().await;
                (b.available(), b.rotation())
            };
            if available == 0 || rotation.is_empty() {
                break;
            }

            let mut claimed_any = false;
            for campaign_id in rotation {
                if budget.lock().await.available() == 0 {
                    break;
                }

                let Some(campaign) = self.database.campaigns().get(campaign_id).await? else {
                    budget.lock().await.remove_campaign(campaign_id);
                    continue;
                };
                if campaign.status != CampaignStatus::Active || !campaign.is_dialable() {
                    budget.lock().await.remove_campaign(campaign_id);
                    continue;
                }

                match self
                    .database
                    .campaigns()
                    .claim_pending_contact(campaign_id)
                    .await?
                {
                    Some(contact) => {
                        claimed_any = true;
                        budget.lock().await.advance_cursor();
                        if let Err(e) = self.initiate_call(&campaign, &contact, budget).await {
                            error!(
                                campaign_id = %campaign_id,
                                contact_id = %contact.id,
                                "call initiation failed: {e}"
                            );
                        }
                    }
                    None => {
                        budget.lock().await.advance_cursor();
                    }
                }
            }

            if !claimed_any {
                // A full pass with no claim means no campaign has pending
                // work; complete any that also have nothing in flight.
                self.complete_drained_campaigns(budget).await;
                break;
            }
        }

        Ok(())
    }

    async fn complete_drained_campaigns(&self, budget: &Arc<Mutex<UserBudget>>) {
        let campaigns: Vec<Uuid> = budget.lock().await.active_campaigns().to_vec();
        for campaign_id in campaigns {
            if let Err(e) = self.check_campaign_completion(campaign_id).await {
                error!(campaign_id = %campaign_id, "completion check failed: {e}");
            }
        }
    }

    /// Complete the campaign if it has nothing pending and nothing in flight
    pub(crate) async fn check_campaign_completion(&self, campaign_id: Uuid) -> AppResult<()> {
        let Some(campaign) = self.database.campaigns().get(campaign_id).await? else {
            return Ok(());
        };
        if campaign.status != CampaignStatus::Active {
            return Ok(());
        }

        let counts = self.database.campaigns().contact_counts(campaign_id).await?;
        if !counts.is_drained() {
            return Ok(());
        }

        info!(campaign_id = %campaign_id, "all contacts terminal, completing campaign");
        self.database
            .campaigns()
            .complete(campaign_id, Utc::now())
            .await?;
        self.remove_campaign_from_budget(campaign.user_id, campaign_id)
            .await;
        Ok(())
    }

    /// Get the user's budget entry, rebuilding it from the store on first touch
    pub(crate) async fn budget_entry(&self, user_id: Uuid) -> AppResult<Arc<Mutex<UserBudget>>> {
        if let Some(entry) = self.budgets.get(user_id).await {
            return Ok(entry);
        }

        let settings = self.database.user_settings().get(user_id).await?;
        let active = self
            .database
            .campaigns()
            .list_by_user_and_status(user_id, CampaignStatus::Active)
            .await?;
        let campaign_ids: Vec<Uuid> = active
            .iter()
            .filter(|c| c.is_dialable())
            .map(|c| c.id)
            .collect();
        let in_progress = self
            .database
            .campaigns()
            .count_in_progress_for_user(user_id, CampaignStatus::Active)
            .await?;

        let budget = UserBudget::new(
            user_id,
            u32::try_from(in_progress.max(0)).unwrap_or(0),
            settings.max_concurrent_calls,
            campaign_ids,
        );
        Ok(self.budgets.insert_if_absent(user_id, budget).await)
    }

    pub(crate) async fn remove_campaign_from_budget(&self, user_id: Uuid, campaign_id: Uuid) {
        if let Some(budget) = self.budgets.get(user_id).await {
            budget.lock().await.remove_campaign(campaign_id);
        }
    }

    /// Record an in-flight call under the given key
    pub(crate) async fn insert_active_call(&self, key: String, record: ActiveCallRecord) {
        self.active_calls.lock().await.insert(key, record);
    }

    /// Drop an in-flight record; removing an absent key is a no-op
    pub(crate) async fn remove_active_call(&self, key: &str) -> Option<ActiveCallRecord> {
        self.active_calls.lock().await.remove(key)
    }

    /// Release one slot for the user, floored at zero
    pub(crate) async fn release_slot(&self, user_id: Uuid) {
        if let Some(budget) = self.budgets.get(user_id).await {
            budget.lock().await.release();
        }
    }

    /// Wake a user's processing pass after a short delay
    ///
    /// The delay lets the store settle after a webhook before the next claim.
    pub(crate) fn schedule_wake(&self, user_id: Uuid) {
        let Some(scheduler) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(
                crate::constants::defaults::WAKE_DELAY_MILLIS,
            ))
            .await;
            if let Err(e) = scheduler.process_user_calls(user_id).await {
                error!(user_id = %user_id, "deferred processing failed: {e}");
            }
        });
    }

    pub(crate) fn database(&self) -> &Database {
        &self.database
    }

    pub(crate) fn engine(&self) -> &dyn VoiceEngine {
        self.engine.as_ref()
    }

    pub(crate) fn telephony(&self) -> &dyn TelephonyGateway {
        self.telephony.as_ref()
    }

    pub(crate) const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub(crate) const fn budgets(&self) -> &BudgetRegistry {
        &self.budgets
    }

    pub(crate) const fn active_calls(&self) -> &Mutex<HashMap<String, ActiveCallRecord>> {
        &self.active_calls
    }
}
