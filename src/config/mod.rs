// ABOUTME: Configuration module for deployment-specific settings
// ABOUTME: Environment-based loading of server, engine, and scheduler options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

pub mod environment;

pub use environment::{DatabaseConfig, EngineConfig, SchedulerConfig, ServerConfig};
