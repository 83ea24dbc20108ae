// ABOUTME: Telephony provider integrations that bridge real calls into engine sessions
// ABOUTME: Unifies Twilio, Plivo, and Telnyx behind one dialing contract with a factory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Herald Voice Intelligence

//! # Telephony Providers
//!
//! Each provider implementation dials the customer from the campaign's
//! caller ID and streams the leg into the voice engine's join URL. Where
//! the provider supports it, a status callback URL carrying the campaign,
//! contact, and call-history ids is attached so terminal leg events reach
//! the webhook reducer.

pub mod plivo;
pub mod telnyx;
pub mod twilio;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::TelephonyCredentials;

/// Correlation tags threaded through bridge requests and status callbacks
#[derive(Debug, Clone)]
pub struct BridgeTags {
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    /// Engine call id, which also keys the call-history row
    pub call_history_id: String,
}

/// One telephony provider account, ready to dial
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Provider tag (`twilio`, `plivo`, `telnyx`)
    fn provider_name(&self) -> &'static str;

    /// Dial `to` from `from` and stream the call into `join_url`
    ///
    /// Returns the provider's own call identifier.
    async fn bridge(
        &self,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String>;
}

/// Create a telephony provider instance from a campaign's provider tag
///
/// # Errors
///
/// Returns an error if the provider tag is not supported.
pub fn create_provider(
    provider_tag: &str,
    credentials: &TelephonyCredentials,
    callback_base: Option<&str>,
) -> AppResult<Box<dyn TelephonyProvider>> {
    match provider_tag.to_lowercase().as_str() {
        "twilio" => Ok(Box::new(twilio::TwilioProvider::new(
            credentials.clone(),
            callback_base.map(ToOwned::to_owned),
        ))),
        "plivo" => Ok(Box::new(plivo::PlivoProvider::new(
            credentials.clone(),
            callback_base.map(ToOwned::to_owned),
        ))),
        "telnyx" => Ok(Box::new(telnyx::TelnyxProvider::new(
            credentials.clone(),
            callback_base.map(ToOwned::to_owned),
        ))),
        other => Err(AppError::invalid_input(format!(
            "unknown telephony provider: {other}. Currently supported: twilio, plivo, telnyx"
        ))),
    }
}

/// Seam between the call initiator and the concrete provider stack
///
/// Production uses [`ProviderGateway`], which resolves the provider from the
/// campaign tag and the owning user's credentials per call; tests substitute
/// a recording fake.
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    async fn bridge(
        &self,
        provider_tag: &str,
        credentials: &TelephonyCredentials,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String>;
}

/// Default gateway dispatching through [`create_provider`]
pub struct ProviderGateway {
    callback_base: Option<String>,
}

impl ProviderGateway {
    #[must_use]
    pub const fn new(callback_base: Option<String>) -> Self {
        Self { callback_base }
    }
}

#[async_trait]
impl TelephonyGateway for ProviderGateway {
    async fn bridge(
        &self,
        provider_tag: &str,
        credentials: &TelephonyCredentials,
        from: &str,
        to: &str,
        join_url: &str,
        tags: &BridgeTags,
    ) -> AppResult<String> {
        let provider = create_provider(provider_tag, credentials, self.callback_base.as_deref())?;
        provider.bridge(from, to, join_url, tags).await
    }
}

/// Build the status-callback URL a provider reports leg events to
#[must_use]
pub fn status_callback_url(base: &str, provider: &str, tags: &BridgeTags) -> String {
    let mut url = format!(
        "{}/webhook/{provider}/status",
        base.trim_end_matches('/')
    );
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("campaignId", &tags.campaign_id.to_string())
        .append_pair("contactId", &tags.contact_id.to_string())
        .append_pair("callHistoryId", &tags.call_history_id)
        .finish();
    url.push('?');
    url.push_str(&query);
    url
}
