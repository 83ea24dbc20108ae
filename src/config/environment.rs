// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Loads server, database, engine, and scheduler options from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Environment-based configuration management
//!
//! Every option has a default suitable for local development; production
//! deployments override through environment variables.

use std::env;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, env_names};
use crate::errors::{AppError, AppResult};

/// Server configuration for the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database settings
    pub database: DatabaseConfig,
    /// Voice engine settings
    pub engine: EngineConfig,
    /// Scheduler timing settings
    pub scheduler: SchedulerConfig,
    /// Public base URL used for webhook registration and status callbacks
    pub webhook_base_url: Option<String>,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite:herald.db` or `sqlite::memory:`
    pub url: String,
}

/// Voice engine client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine API base URL
    pub base_url: String,
    /// Engine API key
    pub api_key: String,
    /// Shared secret for webhook signature verification; unset disables it
    pub webhook_secret: Option<String>,
}

/// Scheduler timing and policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks
    pub tick_interval_seconds: u64,
    /// Minutes before an unterminated active call is reaped
    pub stale_call_threshold_minutes: i64,
    /// Per-call maximum duration handed to the voice engine
    pub call_max_duration_seconds: u32,
    /// Re-queue contacts whose call ended busy instead of failing them
    pub retry_busy: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: defaults::TICK_INTERVAL_SECONDS,
            stale_call_threshold_minutes: defaults::STALE_CALL_THRESHOLD_MINUTES,
            call_max_duration_seconds: defaults::CALL_MAX_DURATION_SECONDS,
            retry_busy: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized variable holds an unparseable value.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            http_port: parse_var(env_names::HTTP_PORT)?.unwrap_or(8081),
            database: DatabaseConfig {
                url: env::var(env_names::DATABASE_URL)
                    .unwrap_or_else(|_| "sqlite:herald.db".into()),
            },
            engine: EngineConfig {
                base_url: env::var(env_names::ENGINE_BASE_URL)
                    .unwrap_or_else(|_| "https://api.ultravox.ai".into()),
                api_key: env::var(env_names::ENGINE_API_KEY).unwrap_or_default(),
                webhook_secret: env::var(env_names::ENGINE_WEBHOOK_SECRET).ok(),
            },
            scheduler: SchedulerConfig {
                tick_interval_seconds: parse_var(env_names::SCHEDULER_TICK_SECONDS)?
                    .unwrap_or(defaults::TICK_INTERVAL_SECONDS),
                stale_call_threshold_minutes: parse_var(env_names::STALE_CALL_THRESHOLD_MINUTES)?
                    .unwrap_or(defaults::STALE_CALL_THRESHOLD_MINUTES),
                call_max_duration_seconds: parse_var(env_names::CALL_MAX_DURATION_SECONDS)?
                    .unwrap_or(defaults::CALL_MAX_DURATION_SECONDS),
                retry_busy: env::var(env_names::RETRY_BUSY)
                    .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
            webhook_base_url: env::var(env_names::WEBHOOK_BASE_URL)
                .ok()
                .map(|url| url.trim_end_matches('/').to_owned()),
        })
    }

    /// One-line summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} database={} tick={}s stale_threshold={}m webhook_base={}",
            self.http_port,
            self.database.url,
            self.scheduler.tick_interval_seconds,
            self.scheduler.stale_call_threshold_minutes,
            self.webhook_base_url.as_deref().unwrap_or("(unset)"),
        )
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::config(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_interval_seconds, 30);
        assert_eq!(config.stale_call_threshold_minutes, 15);
        assert_eq!(config.call_max_duration_seconds, 600);
        assert!(!config.retry_busy);
    }
}
