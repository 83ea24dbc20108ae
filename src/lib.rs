// ABOUTME: Main library entry point for the Herald voice platform control plane
// ABOUTME: Campaign scheduling, call-slot orchestration, and webhook reconciliation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

#![deny(unsafe_code)]

//! # Herald Voice Server
//!
//! The control plane of the Herald voice-AI outbound calling platform.
//! Operators define campaigns: named collections of contacts paired with an
//! agent, a scheduled daily window, and an outbound telephony
//! configuration. The platform autonomously dials those contacts, bridges
//! each call between the voice engine and a telephony provider, and records
//! per-call outcomes.
//!
//! ## Architecture
//!
//! - **Scheduler**: periodic tick that opens and closes campaign windows,
//!   atomically claims contacts, and enforces the per-user concurrency
//!   budget
//! - **Engine**: voice engine client creating AI call sessions with join
//!   URLs for the telephony bridge
//! - **Providers**: Twilio, Plivo, and Telnyx integrations that dial the
//!   customer and stream the leg into the engine session
//! - **Routes**: webhook ingestion from all call-event sources plus the
//!   campaign admin surface
//! - **Database**: SQLite-backed stores for campaigns, contacts, call
//!   history, and user settings; the sole source of durable truth

/// Configuration management from environment variables
pub mod config;

/// Centralized constants for timing defaults and protocol values
pub mod constants;

/// SQLite stores for campaigns, contacts, call history, and user settings
pub mod database;

/// Voice engine client and webhook verification
pub mod engine;

/// Unified error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

/// Core data models and status machines
pub mod models;

/// Telephony provider integrations
pub mod providers;

/// HTTP routes: webhooks, campaign admin, health
pub mod routes;

/// Campaign scheduler and call-slot orchestrator
pub mod scheduler;
