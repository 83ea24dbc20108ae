// ABOUTME: Database operations for campaigns and their contact lists
// ABOUTME: Holds the atomic contact claim that serializes all dialing decisions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::constants::defaults;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CallOutcome, CallStatus, Campaign, CampaignStatus, Contact, OutboundMedium, Schedule,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Pending and in-progress contact counts for one campaign
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CampaignContactCounts {
    pub pending: i64,
    pub in_progress: i64,
}

impl CampaignContactCounts {
    /// A campaign is drained when nothing is waiting or in flight
    #[must_use]
    pub const fn is_drained(self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}

/// Per-campaign contact tallies for the pending-summary view
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    pub campaign_id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
    pub no_answer: i64,
}

/// Campaign and contact query manager
pub struct CampaignsManager {
    pool: SqlitePool,
}

impl CampaignsManager {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a campaign row
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(&self, campaign: &Campaign) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO campaigns (
                id, user_id, name, campaign_type, agent_id, status,
                scheduled_date, scheduled_time, end_time, timezone,
                provider, from_phone,
                completed_calls, successful_calls, failed_calls,
                started_at, completed_at, last_processed_at, paused_reason,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                      $13, $14, $15, $16, $17, $18, $19, $20, $21)
            ",
        )
        .bind(campaign.id.to_string())
        .bind(campaign.user_id.to_string())
        .bind(&campaign.name)
        .bind(campaign.campaign_type.as_str())
        .bind(&campaign.agent_id)
        .bind(campaign.status.as_str())
        .bind(
            campaign
                .schedule
                .as_ref()
                .map(|s| s.scheduled_date.format(DATE_FORMAT).to_string()),
        )
        .bind(
            campaign
                .schedule
                .as_ref()
                .map(|s| s.scheduled_time.format(TIME_FORMAT).to_string()),
        )
        .bind(
            campaign
                .schedule
                .as_ref()
                .and_then(|s| s.end_time.map(|t| t.format(TIME_FORMAT).to_string())),
        )
        .bind(campaign.schedule.as_ref().map(|s| s.timezone.clone()))
        .bind(campaign.outbound_medium.as_ref().map(|m| m.provider.clone()))
        .bind(
            campaign
                .outbound_medium
                .as_ref()
                .map(|m| m.from_phone.clone()),
        )
        .bind(campaign.completed_calls)
        .bind(campaign.successful_calls)
        .bind(campaign.failed_calls)
        .bind(campaign.started_at.map(|t| t.to_rfc3339()))
        .bind(campaign.completed_at.map(|t| t.to_rfc3339()))
        .bind(campaign.last_processed_at.map(|t| t.to_rfc3339()))
        .bind(&campaign.paused_reason)
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create campaign: {e}")))?;

        Ok(())
    }

    /// Get a campaign by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn get(&self, campaign_id: Uuid) -> AppResult<Option<Campaign>> {
        let row = sqlx::query("SELECT * FROM campaigns WHERE id = $1")
            .bind(campaign_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to get campaign: {e}")))?;

        row.map(|r| row_to_campaign(&r)).transpose()
    }

    /// List campaigns for a user filtered by status
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_by_user_and_status(
        &self,
        user_id: Uuid,
        status: CampaignStatus,
    ) -> AppResult<Vec<Campaign>> {
        let rows = sqlx::query(
            "SELECT * FROM campaigns WHERE user_id = $1 AND status = $2 ORDER BY created_at",
        )
        .bind(user_id.to_string())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to list campaigns: {e}")))?;

        rows.iter().map(row_to_campaign).collect()
    }

    /// List all campaigns with the given status across users
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_by_status(&self, status: CampaignStatus) -> AppResult<Vec<Campaign>> {
        let rows = sqlx::query("SELECT * FROM campaigns WHERE status = $1 ORDER BY created_at")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to list campaigns: {e}")))?;

        rows.iter().map(row_to_campaign).collect()
    }

    /// Set a campaign's status without touching window bookkeeping
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_status(&self, campaign_id: Uuid, status: CampaignStatus) -> AppResult<()> {
        sqlx::query("UPDATE campaigns SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(campaign_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to set campaign status: {e}")))?;
        Ok(())
    }

    /// Transition a campaign to `active`, clearing any pause bookkeeping
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn activate(&self, campaign_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE campaigns
            SET status = 'active', paused_reason = NULL, started_at = $1, updated_at = $1
            WHERE id = $2
            ",
        )
        .bind(now.to_rfc3339())
        .bind(campaign_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to activate campaign: {e}")))?;
        Ok(())
    }

    /// Park a campaign whose window closed with pending work remaining
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn park(
        &self,
        campaign_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE campaigns
            SET status = 'paused-time-window', paused_reason = $1,
                last_processed_at = $2, updated_at = $2
            WHERE id = $3
            ",
        )
        .bind(reason)
        .bind(now.to_rfc3339())
        .bind(campaign_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to park campaign: {e}")))?;
        Ok(())
    }

    /// Mark a campaign completed
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn complete(&self, campaign_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE campaigns
            SET status = 'completed', completed_at = $1, updated_at = $1
            WHERE id = $2
            ",
        )
        .bind(now.to_rfc3339())
        .bind(campaign_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to complete campaign: {e}")))?;
        Ok(())
    }

    /// Increment campaign totals for one terminated call
    ///
    /// `completed_calls` counts every terminal outcome; `successful_calls`
    /// counts completed conversations; `failed_calls` counts failures and
    /// unanswered dials.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn record_outcome(&self, campaign_id: Uuid, outcome: CallOutcome) -> AppResult<()> {
        let (successful, failed) = match outcome {
            CallOutcome::Completed => (1i64, 0i64),
            CallOutcome::Failed | CallOutcome::NoAnswer => (0, 1),
        };

        sqlx::query(
            r"
            UPDATE campaigns
            SET completed_calls = completed_calls + 1,
                successful_calls = successful_calls + $1,
                failed_calls = failed_calls + $2,
                updated_at = $3
            WHERE id = $4
            ",
        )
        .bind(successful)
        .bind(failed)
        .bind(Utc::now().to_rfc3339())
        .bind(campaign_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to record outcome: {e}")))?;
        Ok(())
    }

    /// Append contacts at the end of a campaign's dialing order
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub async fn add_contacts(&self, campaign_id: Uuid, contacts: &[Contact]) -> AppResult<()> {
        for contact in contacts {
            sqlx::query(
                r"
                INSERT INTO contacts (
                    id, campaign_id, position, name, phone_number, call_status,
                    engine_call_id, call_history_id, called_at, call_duration, call_notes
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(contact.id.to_string())
            .bind(campaign_id.to_string())
            .bind(contact.position)
            .bind(&contact.name)
            .bind(&contact.phone_number)
            .bind(contact.call_status.as_str())
            .bind(&contact.engine_call_id)
            .bind(&contact.call_history_id)
            .bind(contact.called_at.map(|t| t.to_rfc3339()))
            .bind(contact.call_duration)
            .bind(&contact.call_notes)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to add contact: {e}")))?;
        }
        Ok(())
    }

    /// Get one contact by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn get_contact(&self, contact_id: Uuid) -> AppResult<Option<Contact>> {
        let row = sqlx::query("SELECT * FROM contacts WHERE id = $1")
            .bind(contact_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to get contact: {e}")))?;

        row.map(|r| row_to_contact(&r)).transpose()
    }

    /// List a campaign's contacts in dialing order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_contacts(&self, campaign_id: Uuid) -> AppResult<Vec<Contact>> {
        let rows =
            sqlx::query("SELECT * FROM contacts WHERE campaign_id = $1 ORDER BY position")
                .bind(campaign_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("failed to list contacts: {e}")))?;

        rows.iter().map(row_to_contact).collect()
    }

    /// Atomically claim the first pending contact of a campaign
    ///
    /// This is the only legal path out of `pending`. The conditional
    /// `UPDATE ... WHERE call_status = 'pending'` makes concurrent claimers
    /// race on `rows_affected`; a loser retries against the next snapshot a
    /// bounded number of times before yielding.
    ///
    /// Returns `None` when the campaign has no pending contact.
    ///
    /// # Errors
    ///
    /// Returns an error if a query inside the claim transaction fails.
    pub async fn claim_pending_contact(&self, campaign_id: Uuid) -> AppResult<Option<Contact>> {
        for _ in 0..defaults::CLAIM_RETRY_ATTEMPTS {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| AppError::database(format!("failed to begin claim: {e}")))?;

            let candidate = sqlx::query(
                r"
                SELECT id FROM contacts
                WHERE campaign_id = $1 AND call_status = 'pending'
                ORDER BY position ASC
                LIMIT 1
                ",
            )
            .bind(campaign_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("failed to find pending contact: {e}")))?;

            let Some(candidate) = candidate else {
                return Ok(None);
            };
            let contact_id: String = candidate
                .try_get("id")
                .map_err(|e| AppError::database(e.to_string()))?;

            let claimed = sqlx::query(
                r"
                UPDATE contacts
                SET call_status = 'in-progress', called_at = $1
                WHERE id = $2 AND call_status = 'pending'
                ",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(&contact_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("failed to claim contact: {e}")))?;

            if claimed.rows_affected() == 0 {
                // Lost the race to a concurrent claimer; retry on a fresh snapshot
                tx.rollback()
                    .await
                    .map_err(|e| AppError::database(e.to_string()))?;
                continue;
            }

            tx.commit()
                .await
                .map_err(|e| AppError::database(format!("failed to commit claim: {e}")))?;

            let id = parse_uuid(&contact_id, "contact")?;
            return self.get_contact(id).await;
        }

        Ok(None)
    }

    /// Move an in-progress contact to a terminal status
    ///
    /// The `call_status = 'in-progress'` guard makes this idempotent: a
    /// duplicate terminal event finds no row to update and reports `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn finish_contact(
        &self,
        contact_id: Uuid,
        status: CallStatus,
        call_duration: Option<i64>,
        notes: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE contacts
            SET call_status = $1, call_duration = $2, call_notes = $3
            WHERE id = $4 AND call_status = 'in-progress'
            ",
        )
        .bind(status.as_str())
        .bind(call_duration)
        .bind(notes)
        .bind(contact_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to finish contact: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the engine call id and history row id on a claimed contact
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_contact_call_refs(
        &self,
        contact_id: Uuid,
        engine_call_id: &str,
        call_history_id: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE contacts SET engine_call_id = $1, call_history_id = $2 WHERE id = $3",
        )
        .bind(engine_call_id)
        .bind(call_history_id)
        .bind(contact_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to set contact call refs: {e}")))?;
        Ok(())
    }

    /// Return an in-progress contact to `pending` so it can be redialed
    ///
    /// Only used when the busy-retry knob is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn requeue_contact(&self, contact_id: Uuid, notes: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE contacts
            SET call_status = 'pending', engine_call_id = NULL, call_history_id = NULL,
                call_notes = $1
            WHERE id = $2 AND call_status = 'in-progress'
            ",
        )
        .bind(notes)
        .bind(contact_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to requeue contact: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending and in-progress counts for one campaign
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn contact_counts(&self, campaign_id: Uuid) -> AppResult<CampaignContactCounts> {
        let row = sqlx::query(
            r"
            SELECT
                COALESCE(SUM(CASE WHEN call_status = 'pending' THEN 1 ELSE 0 END), 0)
                    AS pending,
                COALESCE(SUM(CASE WHEN call_status = 'in-progress' THEN 1 ELSE 0 END), 0)
                    AS in_progress
            FROM contacts WHERE campaign_id = $1
            ",
        )
        .bind(campaign_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to count contacts: {e}")))?;

        Ok(CampaignContactCounts {
            pending: row.try_get("pending").unwrap_or(0),
            in_progress: row.try_get("in_progress").unwrap_or(0),
        })
    }

    /// Count in-progress contacts across a user's campaigns with a status
    ///
    /// Used to rebuild the in-memory budget after process start.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_in_progress_for_user(
        &self,
        user_id: Uuid,
        campaign_status: CampaignStatus,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS n
            FROM contacts c
            JOIN campaigns k ON k.id = c.campaign_id
            WHERE k.user_id = $1 AND k.status = $2 AND k.campaign_type = 'outbound'
              AND c.call_status = 'in-progress'
            ",
        )
        .bind(user_id.to_string())
        .bind(campaign_status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to count in-progress: {e}")))?;

        Ok(row.try_get("n").unwrap_or(0))
    }

    /// Fail every in-progress contact in the user's outbound campaigns
    ///
    /// Operator escape hatch for budgets stuck by lost webhooks. Returns the
    /// number of contacts transitioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn reset_in_progress_for_user(
        &self,
        user_id: Uuid,
        notes: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE contacts
            SET call_status = 'failed', call_notes = $1
            WHERE call_status = 'in-progress'
              AND campaign_id IN (
                  SELECT id FROM campaigns
                  WHERE user_id = $2 AND campaign_type = 'outbound'
              )
            ",
        )
        .bind(notes)
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to reset in-progress contacts: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Per-campaign contact tallies across a user's outbound campaigns
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn summaries_for_user(&self, user_id: Uuid) -> AppResult<Vec<CampaignSummary>> {
        let rows = sqlx::query(
            r"
            SELECT k.id, k.name, k.status,
                COALESCE(SUM(CASE WHEN c.call_status = 'pending' THEN 1 ELSE 0 END), 0)
                    AS pending,
                COALESCE(SUM(CASE WHEN c.call_status = 'in-progress' THEN 1 ELSE 0 END), 0)
                    AS in_progress,
                COALESCE(SUM(CASE WHEN c.call_status = 'completed' THEN 1 ELSE 0 END), 0)
                    AS completed,
                COALESCE(SUM(CASE WHEN c.call_status = 'failed' THEN 1 ELSE 0 END), 0)
                    AS failed,
                COALESCE(SUM(CASE WHEN c.call_status = 'no-answer' THEN 1 ELSE 0 END), 0)
                    AS no_answer
            FROM campaigns k
            LEFT JOIN contacts c ON c.campaign_id = k.id
            WHERE k.user_id = $1 AND k.campaign_type = 'outbound'
            GROUP BY k.id, k.name, k.status
            ORDER BY k.created_at
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to summarize campaigns: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(|e| AppError::database(e.to_string()))?;
                let status: String = row
                    .try_get("status")
                    .map_err(|e| AppError::database(e.to_string()))?;
                Ok(CampaignSummary {
                    campaign_id: parse_uuid(&id, "campaign")?,
                    name: row.try_get("name").unwrap_or_default(),
                    status: status.parse()?,
                    pending: row.try_get("pending").unwrap_or(0),
                    in_progress: row.try_get("in_progress").unwrap_or(0),
                    completed: row.try_get("completed").unwrap_or(0),
                    failed: row.try_get("failed").unwrap_or(0),
                    no_answer: row.try_get("no_answer").unwrap_or(0),
                })
            })
            .collect()
    }
}

fn row_to_campaign(row: &SqliteRow) -> AppResult<Campaign> {
    let id: String = row.try_get("id").map_err(|e| AppError::database(e.to_string()))?;
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| AppError::database(e.to_string()))?;
    let campaign_type: String = row
        .try_get("campaign_type")
        .map_err(|e| AppError::database(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| AppError::database(e.to_string()))?;

    let scheduled_date: Option<String> = row.try_get("scheduled_date").ok().flatten();
    let scheduled_time: Option<String> = row.try_get("scheduled_time").ok().flatten();
    let end_time: Option<String> = row.try_get("end_time").ok().flatten();
    let timezone: Option<String> = row.try_get("timezone").ok().flatten();

    let schedule = match (scheduled_date, scheduled_time, timezone) {
        (Some(date), Some(time), Some(tz)) => Some(Schedule {
            scheduled_date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|e| AppError::database(format!("corrupt scheduled_date {date}: {e}")))?,
            scheduled_time: NaiveTime::parse_from_str(&time, TIME_FORMAT)
                .map_err(|e| AppError::database(format!("corrupt scheduled_time {time}: {e}")))?,
            end_time: end_time
                .map(|t| {
                    NaiveTime::parse_from_str(&t, TIME_FORMAT)
                        .map_err(|e| AppError::database(format!("corrupt end_time {t}: {e}")))
                })
                .transpose()?,
            timezone: tz,
        }),
        _ => None,
    };

    let provider: Option<String> = row.try_get("provider").ok().flatten();
    let from_phone: Option<String> = row.try_get("from_phone").ok().flatten();
    let outbound_medium = match (provider, from_phone) {
        (Some(provider), Some(from_phone)) => Some(OutboundMedium {
            provider,
            from_phone,
        }),
        _ => None,
    };

    Ok(Campaign {
        id: parse_uuid(&id, "campaign")?,
        user_id: parse_uuid(&user_id, "user")?,
        name: row.try_get("name").unwrap_or_default(),
        campaign_type: campaign_type.parse()?,
        agent_id: row.try_get("agent_id").unwrap_or_default(),
        status: status.parse()?,
        schedule,
        outbound_medium,
        completed_calls: row.try_get("completed_calls").unwrap_or(0),
        successful_calls: row.try_get("successful_calls").unwrap_or(0),
        failed_calls: row.try_get("failed_calls").unwrap_or(0),
        started_at: opt_timestamp(row, "started_at")?,
        completed_at: opt_timestamp(row, "completed_at")?,
        last_processed_at: opt_timestamp(row, "last_processed_at")?,
        paused_reason: row.try_get("paused_reason").ok().flatten(),
        created_at: req_timestamp(row, "created_at")?,
        updated_at: req_timestamp(row, "updated_at")?,
    })
}

fn row_to_contact(row: &SqliteRow) -> AppResult<Contact> {
    let id: String = row.try_get("id").map_err(|e| AppError::database(e.to_string()))?;
    let campaign_id: String = row
        .try_get("campaign_id")
        .map_err(|e| AppError::database(e.to_string()))?;
    let call_status: String = row
        .try_get("call_status")
        .map_err(|e| AppError::database(e.to_string()))?;

    Ok(Contact {
        id: parse_uuid(&id, "contact")?,
        campaign_id: parse_uuid(&campaign_id, "campaign")?,
        position: row.try_get("position").unwrap_or(0),
        name: row.try_get("name").unwrap_or_default(),
        phone_number: row.try_get("phone_number").unwrap_or_default(),
        call_status: call_status.parse()?,
        engine_call_id: row.try_get("engine_call_id").ok().flatten(),
        call_history_id: row.try_get("call_history_id").ok().flatten(),
        called_at: opt_timestamp(row, "called_at")?,
        call_duration: row.try_get("call_duration").ok().flatten(),
        call_notes: row.try_get("call_notes").ok().flatten(),
    })
}

fn opt_timestamp(row: &SqliteRow, field: &str) -> AppResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(field).ok().flatten();
    raw.map(|s| parse_timestamp(&s, field)).transpose()
}

fn req_timestamp(row: &SqliteRow, field: &str) -> AppResult<DateTime<Utc>> {
    let raw: String = row
        .try_get(field)
        .map_err(|e| AppError::database(e.to_string()))?;
    parse_timestamp(&raw, field)
}
