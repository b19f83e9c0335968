//! Gmail API HTTP client
//!
//! Provides the raw Gmail REST calls used by the session.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::api::{
    ErrorResponse, GmailMessage, ListLabelsResponse, ListMessagesResponse, ProfileResponse,
    SendRequest, SendResponse,
};
use crate::error::MailError;
use crate::models::{MessageId, TokenSet};

/// Raw Gmail API surface the session is built on
pub trait MailApi {
    /// Fetch one page of message references matching `query`
    fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse>;

    /// Fetch a message with headers only (From, To, Subject, Date)
    fn get_metadata(&self, id: &MessageId) -> Result<GmailMessage>;

    /// Fetch a message with its full payload
    fn get_full(&self, id: &MessageId) -> Result<GmailMessage>;

    /// Dispatch a raw RFC 5322 message
    fn send_raw(&self, request: &SendRequest) -> Result<SendResponse>;

    /// List all labels in the mailbox
    fn list_labels(&self) -> Result<ListLabelsResponse>;

    /// The authenticated account's profile
    fn profile(&self) -> Result<ProfileResponse>;
}

/// Shared HTTP agent; non-2xx statuses are returned, not raised
pub(crate) fn http_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(30)))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Gmail API client bound to one access token
pub struct GmailClient {
    agent: ureq::Agent,
    access_token: String,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Headers requested for listings
    const METADATA_HEADERS: [&'static str; 4] = ["From", "To", "Subject", "Date"];

    /// Create a client from a valid token set
    pub fn new(token: &TokenSet) -> Self {
        Self {
            agent: http_agent(),
            access_token: token.access_token.clone(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn message_url(id: &MessageId) -> String {
        format!(
            "{}/users/me/messages/{}",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        )
    }

    fn get_message(&self, id: &MessageId, format: &str) -> Result<GmailMessage> {
        let mut request = self
            .agent
            .get(&Self::message_url(id))
            .header("Authorization", &self.bearer())
            .query("format", format);
        if format == "metadata" {
            for header in Self::METADATA_HEADERS {
                request = request.query("metadataHeaders", header);
            }
        }

        let response = request.call().map_err(transport_error)?;
        read_response(response, Some(id.as_str())).context("Failed to fetch message")
    }
}

impl MailApi for GmailClient {
    fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let url = format!("{}/users/me/messages", Self::BASE_URL);
        let mut request = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .query("maxResults", max_results.clamp(1, 500).to_string());
        if !query.is_empty() {
            request = request.query("q", query);
        }
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        let response = request.call().map_err(transport_error)?;
        read_response(response, None).context("Failed to list messages")
    }

    fn get_metadata(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_message(id, "metadata")
    }

    fn get_full(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_message(id, "full")
    }

    fn send_raw(&self, request: &SendRequest) -> Result<SendResponse> {
        let url = format!("{}/users/me/messages/send", Self::BASE_URL);
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(request)
            .map_err(transport_error)?;
        read_response(response, None).context("Failed to send message")
    }

    fn list_labels(&self) -> Result<ListLabelsResponse> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .map_err(transport_error)?;
        read_response(response, None).context("Failed to list labels")
    }

    fn profile(&self) -> Result<ProfileResponse> {
        let url = format!("{}/users/me/profile", Self::BASE_URL);
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .map_err(transport_error)?;
        read_response(response, None).context("Failed to fetch profile")
    }
}

fn transport_error(err: ureq::Error) -> MailError {
    MailError::Transport(err.to_string())
}

/// Decode a success body, or classify the failure
fn read_response<T: DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
    resource: Option<&str>,
) -> Result<T> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(transport_error)?;

    if (200..300).contains(&status) {
        return serde_json::from_str(&body).context("Failed to parse Gmail response");
    }

    debug!("Gmail API returned HTTP {}: {}", status, body);
    Err(classify_error(status, &body, resource).into())
}

/// Reasons Google uses for throttling on 403 responses
const QUOTA_REASONS: [&str; 4] = [
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "quotaExceeded",
    "dailyLimitExceeded",
];

/// Map an error response to the error taxonomy
pub(crate) fn classify_error(status: u16, body: &str, resource: Option<&str>) -> MailError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let error = parsed.error.unwrap_or_default();
    let message = if error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        error.message.clone()
    };
    let throttled = error
        .errors
        .iter()
        .any(|e| QUOTA_REASONS.contains(&e.reason.as_str()))
        || error.status.as_deref() == Some("RESOURCE_EXHAUSTED");

    match status {
        404 => MailError::NotFound(resource.map_or(message, str::to_string)),
        429 => MailError::QuotaExceeded(message),
        403 if throttled => MailError::QuotaExceeded(message),
        403 => MailError::Permission(message),
        401 => MailError::Authentication(format!("access token rejected: {message}")),
        _ => MailError::Api { status, message },
    }
}
