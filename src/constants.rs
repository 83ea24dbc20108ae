// ABOUTME: Centralized constants for scheduler defaults, limits, and protocol values
// ABOUTME: Single source of truth for timing thresholds and webhook event names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

/// Scheduler timing defaults
pub mod defaults {
    /// Seconds between scheduler ticks
    pub const TICK_INTERVAL_SECONDS: u64 = 30;

    /// Minutes after which an active call with no terminal webhook is reaped
    pub const STALE_CALL_THRESHOLD_MINUTES: i64 = 15;

    /// Default per-call maximum duration handed to the voice engine
    pub const CALL_MAX_DURATION_SECONDS: u32 = 600;

    /// Per-user concurrent call budget when no settings row exists
    pub const MAX_CONCURRENT_CALLS: u32 = 1;

    /// Minutes after the scheduled start inside which a restarted process
    /// may still open a missed window
    pub const START_GRACE_MINUTES: i64 = 30;

    /// Delay before waking a user's processing pass after a slot is released
    pub const WAKE_DELAY_MILLIS: u64 = 1000;

    /// Attempts for the conditional contact claim before yielding
    pub const CLAIM_RETRY_ATTEMPTS: u32 = 3;
}

/// Billing rules applied when a call terminates
pub mod billing {
    /// Billed duration is rounded up to whole minutes with this floor
    pub const MINIMUM_BILLED_SECONDS: i64 = 60;
}

/// Webhook protocol values
pub mod webhooks {
    /// Header carrying the voice engine's HMAC-SHA256 body signature
    pub const ENGINE_SIGNATURE_HEADER: &str = "x-herald-signature";

    /// Engine events the control plane subscribes to at startup
    pub const ENGINE_EVENTS: &[&str] =
        &["call.started", "call.joined", "call.ended", "call.billed"];

    /// Empty TwiML document returned to Twilio status callbacks
    pub const EMPTY_TWIML: &str =
        r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;
}

/// Environment variable names recognized by `ServerConfig::from_env`
pub mod env_names {
    pub const HTTP_PORT: &str = "HTTP_PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const WEBHOOK_BASE_URL: &str = "WEBHOOK_BASE_URL";
    pub const ENGINE_BASE_URL: &str = "ENGINE_BASE_URL";
    pub const ENGINE_API_KEY: &str = "ENGINE_API_KEY";
    pub const ENGINE_WEBHOOK_SECRET: &str = "ENGINE_WEBHOOK_SECRET";
    pub const SCHEDULER_TICK_SECONDS: &str = "SCHEDULER_TICK_SECONDS";
    pub const STALE_CALL_THRESHOLD_MINUTES: &str = "STALE_CALL_THRESHOLD_MINUTES";
    pub const CALL_MAX_DURATION_SECONDS: &str = "CALL_MAX_DURATION_SECONDS";
    pub const RETRY_BUSY: &str = "RETRY_BUSY";
}

/// Service identity
pub mod service {
    pub const NAME: &str = "herald-voice-server";
}
