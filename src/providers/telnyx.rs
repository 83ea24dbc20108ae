// ABOUTME: Telnyx integration that bridges outbound calls into engine sessions
// ABOUTME: Dials via the Call Control API with a dial-time stream URL and event webhook
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{status_callback_url, BridgeTags, TelephonyProvider};
use crate::errors::{AppError, AppResult};
use crate::models::TelephonyCredentials;

const DEFAULT_API_BASE: &str = "https://api.telnyx.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Telnyx Call Control API client
///
/// The `account_id` credential holds the Call Control connection id; the
/// auth token is the API key sent as a bearer token.
pub struct TelnyxProvider {
    client: Client,
    credentials: TelephonyCredentials,
    callback_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelnyxCallData {
    call_control_id: String,
}

#[derive(Debug, Deserialize)]
struct TelnyxCallResponse {
    data: TelnyxCallData,
}

impl TelnyxProvider {
    #[must_use]
    pub fn new(credentials: TelephonyCredentials, callback_base: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            credentials,
            callback_base,
        }
    }

    fn api_base(&self) -> &str {
        self.credentials.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }
}

#[async_trait]
impl TelephonyProvider for TelnyxProvider {
    fn provider_name(&self) -> &'static str {
        "telnyx"
    }

    async fn bridge(
        &self,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String> {
        let url = format!("{}/v2/calls", self.api_base());

        let mut body = json!({
            "connection_id": self.credentials.account_id,
            "from": from,
            "to": to,
            "stream_url": join_url,
            "stream_track": "both_tracks",
            "answering_machine_detection": "detect",
        });

        if let Some(base) = &self.callback_base {
            body["webhook_url"] = json!(status_callback_url(base, "telnyx", tags));
            body["webhook_url_method"] = json!("POST");
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.credentials.auth_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::external(format!(
                "telnyx call creation returned {status}: {text}"
            )));
        }

        let call: TelnyxCallResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::external(format!("unparseable telnyx response: {e}")))?;

        info!(call_control_id = %call.data.call_control_id, to = %to, "telnyx call bridged");
        Ok(call.data.call_control_id)
    }
}
