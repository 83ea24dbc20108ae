// ABOUTME: HTTP client implementation of the voice engine contract
// ABOUTME: Short-timeout reqwest calls with status-coded error mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{
    CreateCallRequest, CreateWebhookRequest, EngineCall, EngineCallDetails, EngineWebhook,
    VoiceEngine,
};
use crate::config::EngineConfig;
use crate::errors::{AppError, AppResult, ErrorCode};

/// Timeouts are deliberately short: a hung engine must not pin a user's
/// processing latch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

/// HTTP client for the voice engine API
pub struct VoiceEngineClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VoiceEngineClient {
    /// Build a client from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let code = if status.is_server_error() {
                ErrorCode::ExternalServiceUnavailable
            } else {
                ErrorCode::ExternalServiceError
            };
            return Err(AppError::new(
                code,
                format!("voice engine returned {status}: {text}"),
            ));
        }

        serde_json::from_str(&text)
            .map_err(|e| AppError::external(format!("unparseable engine response: {e}")))
    }
}

#[async_trait]
impl VoiceEngine for VoiceEngineClient {
    async fn create_call(&self, request: &CreateCallRequest) -> AppResult<EngineCall> {
        self.post_json("/api/calls", request).await
    }

    async fn get_call_details(&self, call_id: &str) -> AppResult<EngineCallDetails> {
        let url = format!("{}/api/calls/{call_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn create_webhook(&self, request: &CreateWebhookRequest) -> AppResult<EngineWebhook> {
        self.post_json("/api/webhooks", request).await
    }

    async fn delete_webhook(&self, webhook_id: &str) -> AppResult<()> {
        let url = format!("{}/api/webhooks/{webhook_id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external(format!(
                "voice engine webhook delete returned {status}"
            )));
        }
        Ok(())
    }
}
