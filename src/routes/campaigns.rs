// ABOUTME: Administrative REST endpoints for campaign control and scheduler introspection
// ABOUTME: Thin handlers over the scheduler's start, pause, resume, reset, and summary operations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Campaign admin routes
//!
//! Unlike the webhook surface, these endpoints return real error codes to
//! the caller; an operator wants to know that a resume was refused and why.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ServerResources;
use crate::errors::AppResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCallStateRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCallStateResponse {
    pub user_id: Uuid,
    pub contacts_reset: u64,
}

/// Build the campaign admin router
pub fn routes(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .route("/campaigns/:id/start", post(start_campaign))
        .route("/campaigns/:id/pause", post(pause_campaign))
        .route("/campaigns/:id/resume", post(resume_campaign))
        .route("/campaigns/:id/state", get(campaign_state))
        .route(
            "/campaigns/:id/generate-instant-call",
            post(generate_instant_call),
        )
        .route("/campaigns/reset-call-state", post(reset_call_state))
        .route("/campaigns/call-state", get(call_state))
        .route("/campaigns/resumable", get(resumable_campaigns))
        .route("/campaigns/pending-summary", get(pending_summary))
        .with_state(resources)
}

async fn start_campaign(
    State(resources): State<Arc<ServerResources>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    resources.scheduler.start_now(id).await?;
    Ok(Json(json!({ "campaignId": id, "status": "active" })))
}

async fn pause_campaign(
    State(resources): State<Arc<ServerResources>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    resources.scheduler.pause(id).await?;
    Ok(Json(json!({ "campaignId": id, "status": "paused" })))
}

async fn resume_campaign(
    State(resources): State<Arc<ServerResources>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    resources.scheduler.resume(id).await?;
    Ok(Json(json!({ "campaignId": id, "status": "active" })))
}

async fn campaign_state(
    State(resources): State<Arc<ServerResources>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let campaign = resources
        .database
        .campaigns()
        .get(id)
        .await?
        .ok_or_else(|| crate::errors::AppError::not_found("campaign"))?;
    let counts = resources.database.campaigns().contact_counts(id).await?;

    Ok(Json(json!({
        "campaign": campaign,
        "contactCounts": counts,
    })))
}

async fn generate_instant_call(
    State(resources): State<Arc<ServerResources>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let contact_id = resources.scheduler.instant_call(id).await?;
    Ok(Json(json!({ "campaignId": id, "contactId": contact_id })))
}

async fn reset_call_state(
    State(resources): State<Arc<ServerResources>>,
    Json(request): Json<ResetCallStateRequest>,
) -> AppResult<Json<ResetCallStateResponse>> {
    let contacts_reset = resources
        .scheduler
        .reset_user_call_state(request.user_id)
        .await?;
    Ok(Json(ResetCallStateResponse {
        user_id: request.user_id,
        contacts_reset,
    }))
}

async fn call_state(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
    let snapshot = resources.scheduler.call_state().await;
    Json(json!(snapshot))
}

async fn resumable_campaigns(
    State(resources): State<Arc<ServerResources>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Value>> {
    let campaigns = resources
        .scheduler
        .resumable_campaigns(query.user_id)
        .await?;
    Ok(Json(json!({ "campaigns": campaigns })))
}

async fn pending_summary(
    State(resources): State<Arc<ServerResources>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<Value>> {
    let summaries = resources
        .scheduler
        .pending_contacts_summary(query.user_id)
        .await?;
    Ok(Json(json!({ "campaigns": summaries })))
}
