// ABOUTME: Database management for the Herald control plane over SQLite
// ABOUTME: Owns the connection pool, schema migration, and per-domain query managers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! # Database Management
//!
//! SQLite-backed storage for campaigns, contacts, call history, and user
//! settings. All durable scheduler state lives here; everything the
//! scheduler keeps in memory is a cache reconstructible from these tables.
//!
//! Contacts are stored in their own table ordered by `position`, which is
//! what makes the atomic `pending -> in-progress` claim a single
//! conditional `UPDATE` (see `CampaignsManager::claim_pending_contact`).

pub mod call_history;
pub mod campaigns;
pub mod user_settings;

pub use call_history::CallHistoryManager;
pub use campaigns::{CampaignContactCounts, CampaignSummary, CampaignsManager};
pub use user_settings::UserSettingsManager;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Database manager holding the shared connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migration fails.
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        // An in-memory database exists per connection; cap the pool at one
        // so every handle sees the same data.
        let max_connections = if connection_options.contains(":memory:") {
            1
        } else {
            10
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("failed to connect: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run schema migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                campaign_type TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                status TEXT NOT NULL,
                scheduled_date TEXT,
                scheduled_time TEXT,
                end_time TEXT,
                timezone TEXT,
                provider TEXT,
                from_phone TEXT,
                completed_calls INTEGER NOT NULL DEFAULT 0,
                successful_calls INTEGER NOT NULL DEFAULT 0,
                failed_calls INTEGER NOT NULL DEFAULT 0,
                started_at TEXT,
                completed_at TEXT,
                last_processed_at TEXT,
                paused_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create campaigns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_campaigns_user_status ON campaigns(user_id, status)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                call_status TEXT NOT NULL DEFAULT 'pending',
                engine_call_id TEXT,
                call_history_id TEXT,
                called_at TEXT,
                call_duration INTEGER,
                call_notes TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create contacts table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contacts_campaign_status
             ON contacts(campaign_id, call_status, position)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS call_history (
                engine_call_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                customer_phone TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                duration_seconds INTEGER,
                end_reason TEXT,
                billed_duration_seconds INTEGER,
                summary TEXT,
                short_summary TEXT,
                recording_url TEXT,
                campaign_id TEXT NOT NULL,
                contact_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create call_history table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_call_history_campaign ON call_history(campaign_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id TEXT PRIMARY KEY,
                max_concurrent_calls INTEGER NOT NULL DEFAULT 1,
                telephony TEXT NOT NULL DEFAULT '{}'
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("failed to create user_settings table: {e}")))?;

        Ok(())
    }

    /// Campaign and contact operations
    #[must_use]
    pub fn campaigns(&self) -> CampaignsManager {
        CampaignsManager::new(self.pool.clone())
    }

    /// Call history operations
    #[must_use]
    pub fn call_history(&self) -> CallHistoryManager {
        CallHistoryManager::new(self.pool.clone())
    }

    /// User settings operations
    #[must_use]
    pub fn user_settings(&self) -> UserSettingsManager {
        UserSettingsManager::new(self.pool.clone())
    }

    /// Access to the raw pool for health checks
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse a stored UUID column
pub(crate) fn parse_uuid(raw: &str, field: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| AppError::database(format!("corrupt {field} uuid {raw}: {e}")))
}

/// Parse a stored RFC 3339 timestamp column
pub(crate) fn parse_timestamp(raw: &str, field: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("corrupt {field} timestamp {raw}: {e}")))
}
