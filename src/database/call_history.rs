// ABOUTME: Database operations for per-call history rows keyed by engine call id
// ABOUTME: Insert at call creation, idempotent finalize on terminal webhook
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult};
use crate::models::{CallHistory, CallStatus};

/// Finalization payload applied when a call terminates
#[derive(Debug, Clone)]
pub struct CallFinalization {
    pub status: CallStatus,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub end_reason: String,
    pub billed_duration_seconds: Option<i64>,
    pub summary: Option<String>,
    pub short_summary: Option<String>,
    pub recording_url: Option<String>,
}

/// Call history query manager
pub struct CallHistoryManager {
    pool: SqlitePool,
}

impl CallHistoryManager {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a history row at call-creation time
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(&self, call: &CallHistory) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO call_history (
                engine_call_id, user_id, agent_id, customer_name, customer_phone,
                status, started_at, ended_at, duration_seconds, end_reason,
                billed_duration_seconds, summary, short_summary, recording_url,
                campaign_id, contact_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ",
        )
        .bind(&call.engine_call_id)
        .bind(call.user_id.to_string())
        .bind(&call.agent_id)
        .bind(&call.customer_name)
        .bind(&call.customer_phone)
        .bind(call.status.as_str())
        .bind(call.started_at.to_rfc3339())
        .bind(call.ended_at.map(|t| t.to_rfc3339()))
        .bind(call.duration_seconds)
        .bind(&call.end_reason)
        .bind(call.billed_duration_seconds)
        .bind(&call.summary)
        .bind(&call.short_summary)
        .bind(&call.recording_url)
        .bind(call.campaign_id.to_string())
        .bind(call.contact_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to insert call history: {e}")))?;

        Ok(())
    }

    /// Look up a history row by the engine's call id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn get(&self, engine_call_id: &str) -> AppResult<Option<CallHistory>> {
        let row = sqlx::query("SELECT * FROM call_history WHERE engine_call_id = $1")
            .bind(engine_call_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("failed to get call history: {e}")))?;

        row.map(|r| row_to_call_history(&r)).transpose()
    }

    /// Apply terminal fields to an in-progress history row
    ///
    /// The `status = 'in-progress'` guard is what makes duplicate terminal
    /// webhooks no-ops: a second finalize finds no row to update and
    /// reports `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn finalize(
        &self,
        engine_call_id: &str,
        finalization: &CallFinalization,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE call_history
            SET status = $1, ended_at = $2, duration_seconds = $3, end_reason = $4,
                billed_duration_seconds = $5,
                summary = COALESCE($6, summary),
                short_summary = COALESCE($7, short_summary),
                recording_url = COALESCE($8, recording_url)
            WHERE engine_call_id = $9 AND status = 'in-progress'
            ",
        )
        .bind(finalization.status.as_str())
        .bind(finalization.ended_at.to_rfc3339())
        .bind(finalization.duration_seconds)
        .bind(&finalization.end_reason)
        .bind(finalization.billed_duration_seconds)
        .bind(&finalization.summary)
        .bind(&finalization.short_summary)
        .bind(&finalization.recording_url)
        .bind(engine_call_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to finalize call history: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_call_history(row: &SqliteRow) -> AppResult<CallHistory> {
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| AppError::database(e.to_string()))?;
    let campaign_id: String = row
        .try_get("campaign_id")
        .map_err(|e| AppError::database(e.to_string()))?;
    let contact_id: String = row
        .try_get("contact_id")
        .map_err(|e| AppError::database(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| AppError::database(e.to_string()))?;
    let started_at: String = row
        .try_get("started_at")
        .map_err(|e| AppError::database(e.to_string()))?;
    let ended_at: Option<String> = row.try_get("ended_at").ok().flatten();

    Ok(CallHistory {
        engine_call_id: row.try_get("engine_call_id").unwrap_or_default(),
        user_id: parse_uuid(&user_id, "user")?,
        agent_id: row.try_get("agent_id").unwrap_or_default(),
        customer_name: row.try_get("customer_name").unwrap_or_default(),
        customer_phone: row.try_get("customer_phone").unwrap_or_default(),
        status: status.parse()?,
        started_at: parse_timestamp(&started_at, "started_at")?,
        ended_at: ended_at
            .map(|s| parse_timestamp(&s, "ended_at"))
            .transpose()?,
        duration_seconds: row.try_get("duration_seconds").ok().flatten(),
        end_reason: row.try_get("end_reason").ok().flatten(),
        billed_duration_seconds: row.try_get("billed_duration_seconds").ok().flatten(),
        summary: row.try_get("summary").ok().flatten(),
        short_summary: row.try_get("short_summary").ok().flatten(),
        recording_url: row.try_get("recording_url").ok().flatten(),
        campaign_id: parse_uuid(&campaign_id, "campaign")?,
        contact_id: parse_uuid(&contact_id, "contact")?,
    })
}
