// ABOUTME: HTTP-level tests for the liveness and readiness endpoints
// ABOUTME: Readiness must track whether the database still answers queries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::create_test_harness;
use herald_voice_server::{
    config::{DatabaseConfig, EngineConfig, SchedulerConfig, ServerConfig},
    routes::{self, ServerResources},
};
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        engine: EngineConfig {
            base_url: "https://engine.test".into(),
            api_key: "key".into(),
            webhook_secret: None,
        },
        scheduler: SchedulerConfig::default(),
        webhook_base_url: None,
    }
}

#[tokio::test]
async fn test_health_and_ready_with_live_database() {
    let harness = create_test_harness().await.unwrap();
    let resources = Arc::new(ServerResources {
        database: harness.database.clone(),
        scheduler: harness.scheduler.clone(),
        config: test_config(),
    });

    let response = routes::router(resources.clone())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = routes::router(resources)
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ready_reports_unavailable_when_database_is_gone() {
    let harness = create_test_harness().await.unwrap();
    let resources = Arc::new(ServerResources {
        database: harness.database.clone(),
        scheduler: harness.scheduler.clone(),
        config: test_config(),
    });

    harness.database.pool().close().await;

    let response = routes::router(resources)
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
