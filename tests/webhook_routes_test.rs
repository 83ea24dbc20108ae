// ABOUTME: HTTP-level tests for the webhook ingestion endpoints
// ABOUTME: Signature enforcement, provider payload parsing, and always-acknowledge behavior
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{create_test_harness, seed_user, CampaignBuilder, TestHarness};
use herald_voice_server::{
    config::{DatabaseConfig, EngineConfig, SchedulerConfig, ServerConfig},
    models::CallStatus,
    routes::{self, ServerResources},
};
use ring::hmac;
use tower::ServiceExt;

fn test_config(webhook_secret: Option<&str>) -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        engine: EngineConfig {
            base_url: "https://engine.test".into(),
            api_key: "key".into(),
            webhook_secret: webhook_secret.map(ToOwned::to_owned),
        },
        scheduler: SchedulerConfig::default(),
        webhook_base_url: None,
    }
}

fn app(harness: &TestHarness, webhook_secret: Option<&str>) -> axum::Router {
    let resources = Arc::new(ServerResources {
        database: harness.database.clone(),
        scheduler: harness.scheduler.clone(),
        config: test_config(webhook_secret),
    });
    routes::router(resources)
}

fn sign(secret: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hex::encode(hmac::sign(&key, body).as_ref())
}

/// Dial one contact so webhook handlers have a live call to terminate
async fn dial_one(harness: &TestHarness) -> uuid::Uuid {
    let user_id = seed_user(&harness.database, 1).await.unwrap();
    let campaign = CampaignBuilder::new(user_id)
        .contacts(1)
        .build(&harness.database)
        .await
        .unwrap();
    harness.scheduler.process_user_calls(user_id).await.unwrap();
    campaign.id
}

#[tokio::test]
async fn test_engine_webhook_rejects_bad_signature() {
    let harness = create_test_harness().await.unwrap();
    let campaign_id = dial_one(&harness).await;
    let app = app(&harness, Some("sekrit"));

    let body = br#"{"event":"call.ended","call_id":"EC1","end_reason":"hangup"}"#;
    let response = app
        .oneshot(
            Request::post("/webhook/engine")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-herald-signature", "deadbeef")
                .body(Body::from(&body[..]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // No state change behind the rejection
    let contacts = harness
        .database
        .campaigns()
        .list_contacts(campaign_id)
        .await
        .unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::InProgress);
}

#[tokio::test]
async fn test_engine_webhook_applies_signed_event() {
    let harness = create_test_harness().await.unwrap();
    let campaign_id = dial_one(&harness).await;
    let app = app(&harness, Some("sekrit"));

    let body = br#"{"event":"call.ended","call_id":"EC1","end_reason":"hangup","duration_seconds":95}"#;
    let response = app
        .oneshot(
            Request::post("/webhook/engine")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-herald-signature", sign("sekrit", body))
                .body(Body::from(&body[..]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let contacts = harness
        .database
        .campaigns()
        .list_contacts(campaign_id)
        .await
        .unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Completed);
    assert_eq!(contacts[0].call_duration, Some(95));

    let history = harness
        .database
        .call_history()
        .get("EC1")
        .await
        .unwrap()
        .unwrap();
    // 95 seconds bills as two whole minutes
    assert_eq!(history.billed_duration_seconds, Some(120));
}

#[tokio::test]
async fn test_engine_webhook_acknowledges_unknown_call() {
    let harness = create_test_harness().await.unwrap();
    let app = app(&harness, None);

    let body = br#"{"event":"call.ended","call_id":"EC-unknown","end_reason":"hangup"}"#;
    let response = app
        .oneshot(
            Request::post("/webhook/engine")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(&body[..]))
                .unwrap(),
        )
        .await
        .unwrap();

    // Unknown call ids are acknowledged so the engine does not retry
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_twilio_status_returns_empty_twiml() {
    let harness = create_test_harness().await.unwrap();
    let campaign_id = dial_one(&harness).await;
    let app = app(&harness, None);

    let response = app
        .oneshot(
            Request::post("/webhook/twilio/status?campaignId=c&contactId=c&callHistoryId=EC1")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "CallSid=CA123&CallStatus=completed&CallDuration=42",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(content_type.contains("xml"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("<Response></Response>"));

    let contacts = harness
        .database
        .campaigns()
        .list_contacts(campaign_id)
        .await
        .unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Completed);
}

#[tokio::test]
async fn test_telnyx_hangup_applies_outcome() {
    let harness = create_test_harness().await.unwrap();
    let campaign_id = dial_one(&harness).await;
    let app = app(&harness, None);

    let body = serde_json::json!({
        "data": {
            "event_type": "call.hangup",
            "payload": { "hangup_cause": "user_busy" }
        }
    });
    let response = app
        .oneshot(
            Request::post("/webhook/telnyx/status?callHistoryId=EC1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let contacts = harness
        .database
        .campaigns()
        .list_contacts(campaign_id)
        .await
        .unwrap();
    assert_eq!(contacts[0].call_status, CallStatus::Failed);
}

#[tokio::test]
async fn test_plivo_answer_returns_stream_xml() {
    let harness = create_test_harness().await.unwrap();
    let app = app(&harness, None);

    let response = app
        .oneshot(
            Request::get("/webhook/plivo/answer?joinUrl=wss%3A%2F%2Fengine.test%2Fjoin%2FEC1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("wss://engine.test/join/EC1"));
    assert!(text.contains("<Stream"));
}
