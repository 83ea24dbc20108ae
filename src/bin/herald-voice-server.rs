// ABOUTME: Server binary for the Herald voice platform control plane
// ABOUTME: Bootstraps configuration, database, scheduler, and the HTTP listener
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

#![forbid(unsafe_code)]

//! # Herald Voice Server Binary
//!
//! Starts the campaign scheduler and the webhook/admin HTTP surface.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use herald_voice_server::{
    config::environment::ServerConfig,
    constants::webhooks,
    database::Database,
    engine::{CreateWebhookRequest, VoiceEngine, VoiceEngineClient},
    logging,
    providers::ProviderGateway,
    routes::{self, ServerResources},
    scheduler::CampaignScheduler,
};

#[derive(Parser)]
#[command(name = "herald-voice-server")]
#[command(about = "Herald voice platform - campaign scheduler and call orchestrator")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;
    info!("starting herald-voice-server");
    info!("{}", config.summary());

    let database = Arc::new(Database::new(&config.database.url).await?);
    info!("database initialized");

    let engine: Arc<dyn VoiceEngine> = Arc::new(VoiceEngineClient::new(&config.engine));
    let telephony = Arc::new(ProviderGateway::new(config.webhook_base_url.clone()));

    let scheduler = CampaignScheduler::new(
        database.clone(),
        engine.clone(),
        telephony,
        config.scheduler.clone(),
    );

    register_engine_webhook(engine.as_ref(), &config).await;

    scheduler.start().await;

    let resources = Arc::new(ServerResources {
        database,
        scheduler: scheduler.clone(),
        config: config.clone(),
    });

    let app = routes::router(resources);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    info!("shutdown complete");
    Ok(())
}

/// Register our engine webhook endpoint when a public base URL is known
///
/// Registration failure is a warning, not a startup error: the operator may
/// have registered the webhook out of band.
async fn register_engine_webhook(engine: &dyn VoiceEngine, config: &ServerConfig) {
    let Some(base_url) = &config.webhook_base_url else {
        warn!("WEBHOOK_BASE_URL unset, skipping engine webhook registration");
        return;
    };

    let request = CreateWebhookRequest {
        url: format!("{base_url}/webhook/engine"),
        events: webhooks::ENGINE_EVENTS.iter().map(ToString::to_string).collect(),
        agent_id: None,
        secret: config.engine.webhook_secret.clone(),
    };

    match engine.create_webhook(&request).await {
        Ok(webhook) => info!(webhook_id = %webhook.webhook_id, "engine webhook registered"),
        Err(e) => warn!("engine webhook registration failed: {e}"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
    }
}
