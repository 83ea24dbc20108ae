// ABOUTME: Database operations for per-user operator settings
// ABOUTME: Concurrency budget cap and telephony credentials keyed by provider tag
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::UserSettings;

/// User settings query manager
pub struct UserSettingsManager {
    pool: SqlitePool,
}

impl UserSettingsManager {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get settings for a user, falling back to defaults when absent
    ///
    /// The cap is re-read on every processing pass, so operator changes take
    /// effect without a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or stored credentials are corrupt.
    pub async fn get(&self, user_id: Uuid) -> AppResult<UserSettings> {
        let row = sqlx::query(
            "SELECT max_concurrent_calls, telephony FROM user_settings WHERE user_id = $1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to get user settings: {e}")))?;

        let Some(row) = row else {
            return Ok(UserSettings::defaults_for(user_id));
        };

        let max_concurrent_calls: i64 = row.try_get("max_concurrent_calls").unwrap_or(1);
        let telephony_json: String = row
            .try_get("telephony")
            .unwrap_or_else(|_| String::from("{}"));

        Ok(UserSettings {
            user_id,
            max_concurrent_calls: u32::try_from(max_concurrent_calls.max(0)).unwrap_or(1),
            telephony: serde_json::from_str(&telephony_json).map_err(|e| {
                AppError::database(format!("corrupt telephony credentials: {e}"))
            })?,
        })
    }

    /// Create or replace a user's settings row
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, settings: &UserSettings) -> AppResult<()> {
        let telephony_json = serde_json::to_string(&settings.telephony)?;

        sqlx::query(
            r"
            INSERT INTO user_settings (user_id, max_concurrent_calls, telephony)
            VALUES ($1, $2, $3)
            ON CONFLICT(user_id) DO UPDATE
            SET max_concurrent_calls = excluded.max_concurrent_calls,
                telephony = excluded.telephony
            ",
        )
        .bind(settings.user_id.to_string())
        .bind(i64::from(settings.max_concurrent_calls))
        .bind(telephony_json)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to upsert user settings: {e}")))?;

        Ok(())
    }
}
