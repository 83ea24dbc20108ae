// ABOUTME: Inbound webhook endpoints for engine and telephony provider call events
// ABOUTME: Normalizes mixed wire shapes and always acknowledges to suppress provider retries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! Webhook routes
//!
//! Four sources post here with four different wire shapes. Each handler
//! projects its shape onto the scheduler's normalized events and always
//! answers success-shaped, whatever happened while applying the event; a
//! processing failure on our side must not trigger the sender's retry
//! machinery. The one exception is an engine signature mismatch, which is
//! rejected before any state change.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use super::ServerResources;
use crate::constants::webhooks;
use crate::engine::{EngineWebhookEvent, SignatureValidation, WebhookSignatureValidator};
use crate::providers::plivo::PlivoProvider;
use crate::scheduler::reducer::TelephonyStatusEvent;

/// Correlation lookup key carried by every telephony status callback
///
/// The callback URL also carries `campaignId` and `contactId`, but the
/// reducer resolves both from the call-history row, so only the history id
/// is read here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackTags {
    pub call_history_id: String,
}

/// Build the webhook router
pub fn routes(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .route("/webhook/engine", post(engine_webhook))
        .route("/webhook/twilio/status", post(twilio_status))
        .route("/webhook/plivo/status", post(plivo_status))
        .route("/webhook/plivo/answer", get(plivo_answer))
        .route("/webhook/telnyx/status", post(telnyx_status_webhook))
        .with_state(resources)
}

fn ack_json() -> Response {
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

fn ack_twiml() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        webhooks::EMPTY_TWIML.to_owned(),
    )
        .into_response()
}

/// Voice engine lifecycle events, HMAC-verified when a secret is configured
async fn engine_webhook(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let validator =
        WebhookSignatureValidator::new(resources.config.engine.webhook_secret.clone());
    let signature = headers
        .get(webhooks::ENGINE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    match validator.validate(signature, &body) {
        SignatureValidation::Valid | SignatureValidation::NotConfigured => {}
        result => {
            warn!(?result, "rejecting engine webhook with bad signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid signature" })),
            )
                .into_response();
        }
    }

    let event: EngineWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("unparseable engine webhook payload: {e}");
            return ack_json();
        }
    };

    debug!(event = %event.event, call_id = %event.call_id, "engine webhook received");

    if let Some(terminated) = event.normalize() {
        if let Err(e) = resources.scheduler.handle_call_terminated(&terminated).await {
            error!(call_id = %event.call_id, "failed to apply engine event: {e}");
        }
    }

    ack_json()
}

/// Twilio leg status callback (form-encoded)
#[derive(Debug, Deserialize)]
struct TwilioStatusForm {
    #[serde(rename = "CallStatus")]
    call_status: String,
    #[serde(rename = "CallDuration")]
    call_duration: Option<String>,
}

async fn twilio_status(
    State(resources): State<Arc<ServerResources>>,
    Query(tags): Query<CallbackTags>,
    Form(form): Form<TwilioStatusForm>,
) -> Response {
    let event = TelephonyStatusEvent {
        provider: "twilio".into(),
        engine_call_id: tags.call_history_id,
        status: form.call_status,
        duration_seconds: form.call_duration.and_then(|d| d.parse().ok()),
    };

    if let Err(e) = resources.scheduler.handle_telephony_status(&event).await {
        error!(engine_call_id = %event.engine_call_id, "failed to apply twilio status: {e}");
    }

    ack_twiml()
}

/// Plivo hangup callback (form-encoded)
#[derive(Debug, Deserialize)]
struct PlivoStatusForm {
    #[serde(rename = "CallStatus", alias = "Event")]
    call_status: String,
    #[serde(rename = "Duration")]
    duration: Option<String>,
}

async fn plivo_status(
    State(resources): State<Arc<ServerResources>>,
    Query(tags): Query<CallbackTags>,
    Form(form): Form<PlivoStatusForm>,
) -> Response {
    let event = TelephonyStatusEvent {
        provider: "plivo".into(),
        engine_call_id: tags.call_history_id,
        status: form.call_status.to_lowercase(),
        duration_seconds: form.duration.and_then(|d| d.parse().ok()),
    };

    if let Err(e) = resources.scheduler.handle_telephony_status(&event).await {
        error!(engine_call_id = %event.engine_call_id, "failed to apply plivo status: {e}");
    }

    ack_json()
}

/// Plivo answer XML that streams the answered leg into the engine session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlivoAnswerQuery {
    join_url: String,
}

async fn plivo_answer(Query(query): Query<PlivoAnswerQuery>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        PlivoProvider::answer_xml(&query.join_url),
    )
        .into_response()
}

/// Telnyx call-control event envelope
#[derive(Debug, Deserialize)]
struct TelnyxWebhook {
    data: TelnyxEventData,
}

#[derive(Debug, Deserialize)]
struct TelnyxEventData {
    event_type: String,
    payload: TelnyxPayload,
}

#[derive(Debug, Deserialize)]
struct TelnyxPayload {
    hangup_cause: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

/// Map a Telnyx hangup cause onto the shared telephony status vocabulary
fn telnyx_status(hangup_cause: &str) -> &'static str {
    match hangup_cause {
        "normal_clearing" => "completed",
        "user_busy" => "busy",
        "no_answer" => "no-answer",
        "timeout" => "timeout",
        "originator_cancel" => "canceled",
        "machine_detected" => "machine",
        _ => "failed",
    }
}

async fn telnyx_status_handler(
    resources: &ServerResources,
    tags: CallbackTags,
    webhook: TelnyxWebhook,
) {
    if webhook.data.event_type != "call.hangup" {
        debug!(event_type = %webhook.data.event_type, "ignoring non-terminal telnyx event");
        return;
    }

    let cause = webhook
        .data
        .payload
        .hangup_cause
        .as_deref()
        .unwrap_or("failed");
    let duration_seconds = match (webhook.data.payload.start_time, webhook.data.payload.end_time) {
        (Some(start), Some(end)) => Some((end - start).num_seconds().max(0)),
        _ => None,
    };

    let event = TelephonyStatusEvent {
        provider: "telnyx".into(),
        engine_call_id: tags.call_history_id,
        status: telnyx_status(cause).to_owned(),
        duration_seconds,
    };

    if let Err(e) = resources.scheduler.handle_telephony_status(&event).await {
        error!(engine_call_id = %event.engine_call_id, "failed to apply telnyx event: {e}");
    }
}

async fn telnyx_status_webhook(
    State(resources): State<Arc<ServerResources>>,
    Query(tags): Query<CallbackTags>,
    body: Bytes,
) -> Response {
    match serde_json::from_slice::<TelnyxWebhook>(&body) {
        Ok(webhook) => telnyx_status_handler(&resources, tags, webhook).await,
        Err(e) => warn!("unparseable telnyx webhook payload: {e}"),
    }
    ack_json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telnyx_hangup_cause_mapping() {
        assert_eq!(telnyx_status("normal_clearing"), "completed");
        assert_eq!(telnyx_status("user_busy"), "busy");
        assert_eq!(telnyx_status("no_answer"), "no-answer");
        assert_eq!(telnyx_status("machine_detected"), "machine");
        assert_eq!(telnyx_status("call_rejected"), "failed");
    }
}
