// ABOUTME: Twilio integration that bridges outbound calls into engine sessions
// ABOUTME: Dials via the Calls API with inline TwiML Connect/Stream and a status callback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use super::{status_callback_url, BridgeTags, TelephonyProvider};
use crate::errors::{AppError, AppResult};
use crate::models::TelephonyCredentials;

const DEFAULT_API_BASE: &str = "https://api.twilio.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Twilio Calls API client
pub struct TwilioProvider {
    client: Client,
    credentials: TelephonyCredentials,
    callback_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioCallResponse {
    sid: String,
}

impl TwilioProvider {
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

    /// TwiML that connects the answered leg to the engine's media stream
    fn connect_twiml(join_url: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Connect><Stream url="{join_url}"/></Connect></Response>"#
        )
    }
}

#[async_trait]
impl TelephonyProvider for TwilioProvider {
    fn provider_name(&self) -> &'static str {
        "twilio"
    }

    async fn bridge(
        &self,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base(),
            self.credentials.account_id
        );

        let twiml = Self::connect_twiml(join_url);
        let mut form: Vec<(&str, String)> = vec![
            ("From", from.to_owned()),
            ("To", to.to_owned()),
            ("Twiml", twiml),
            ("MachineDetection", "Enable".to_owned()),
        ];

        if let Some(base) = &self.callback_base {
            form.push(("StatusCallback", status_callback_url(base, "twilio", tags)));
            form.push(("StatusCallbackEvent", "completed".to_owned()));
            form.push(("StatusCallbackMethod", "POST".to_owned()));
        }

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.account_id, Some(&self.credentials.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::external(format!(
                "twilio call creation returned {status}: {text}"
            )));
        }

        let call: TwilioCallResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::external(format!("unparseable twilio response: {e}")))?;

        info!(call_sid = %call.sid, to = %to, "twilio call bridged");
        Ok(call.sid)
    }
}
