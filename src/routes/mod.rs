// ABOUTME: Route module organization for the Herald control plane HTTP endpoints
// ABOUTME: Assembles webhook, campaign admin, and health routers over shared server resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Route modules
//!
//! Thin handlers only: webhook routes normalize wire payloads and hand them
//! to the scheduler's reducer; campaign routes delegate to the scheduler's
//! administrative operations. Authentication sits in front of this service
//! and is not handled here.

pub mod campaigns;
pub mod health;
pub mod webhooks;

pub use health::HealthRoutes;

use std::sync::Arc;

use axum::Router;

use crate::config::ServerConfig;
use crate::database::Database;
use crate::scheduler::CampaignScheduler;

/// Shared state handed to every route handler
pub struct ServerResources {
    pub database: Arc<Database>,
    pub scheduler: Arc<CampaignScheduler>,
    pub config: ServerConfig,
}

/// Build the full application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(webhooks::routes(resources.clone()))
        .merge(campaigns::routes(resources))
}
