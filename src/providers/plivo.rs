// ABOUTME: Plivo integration that bridges outbound calls into engine sessions
// ABOUTME: Dials via the Call API with an answer-XML stream and a hangup callback
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

const DEFAULT_API_BASE: &str = "https://api.plivo.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Plivo Call API client
///
/// Plivo has no inline dial-time stream parameter, so the answered leg
/// fetches answer XML from our own `/webhook/plivo/answer` route, which
/// returns a `<Stream>` element pointing at the engine join URL.
pub struct PlivoProvider {
    client: Client,
    credentials: TelephonyCredentials,
    callback_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlivoCallResponse {
    request_uuid: String,
}

impl PlivoProvider {
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

    /// Answer XML returned to Plivo when the callee picks up
    #[must_use]
    pub fn answer_xml(join_url: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Stream keepCallAlive="true" bidirectional="true">{join_url}</Stream></Response>"#
        )
    }
}

#[async_trait]
impl TelephonyProvider for PlivoProvider {
    fn provider_name(&self) -> &'static str {
        "plivo"
    }

    async fn bridge(
        &self,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String> {
        let Some(base) = &self.callback_base else {
            return Err(AppError::config(
                "plivo dialing requires WEBHOOK_BASE_URL for the answer XML route",
            ));
        };

        let url = format!(
            "{}/v1/Account/{}/Call/",
            self.api_base(),
            self.credentials.account_id
        );

        let answer_url = format!(
            "{}/webhook/plivo/answer?{}",
            base.trim_end_matches('/'),
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("joinUrl", join_url)
                .finish()
        );

        let body = json!({
            "from": from,
            "to": to,
            "answer_url": answer_url,
            "answer_method": "GET",
            "hangup_url": status_callback_url(base, "plivo", tags),
            "hangup_method": "POST",
            "machine_detection": "true",
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.account_id, Some(&self.credentials.auth_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::external(format!(
                "plivo call creation returned {status}: {text}"
            )));
        }

        let call: PlivoCallResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::external(format!("unparseable plivo response: {e}")))?;

        info!(request_uuid = %call.request_uuid, to = %to, "plivo call bridged");
        Ok(call.request_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_xml_embeds_join_url() {
        let xml = PlivoProvider::answer_xml("wss://engine.example/join/EC1");
        assert!(xml.contains(">wss://engine.example/join/EC1</Stream>"));
        assert!(xml.contains(r#"keepCallAlive="true""#));
    }
}
