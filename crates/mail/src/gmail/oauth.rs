//! OAuth2 token endpoint exchanges
//!
//! Uses synchronous HTTP (ureq), like the rest of the Gmail integration.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeSet;

use super::client::http_agent;
use crate::config::ClientSecret;
use crate::error::MailError;
use crate::models::TokenSet;

/// Token response from the provider
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    /// Space-separated granted scopes
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Lifetime assumed when the provider omits `expires_in`
    const DEFAULT_LIFETIME_SECS: i64 = 3600;

    /// Convert into a token set
    ///
    /// `fallback_refresh` is carried forward when the response has no refresh
    /// token; `fallback_scopes` is used when it has no `scope` field.
    pub fn into_token_set(
        self,
        fallback_refresh: Option<String>,
        fallback_scopes: &BTreeSet<String>,
    ) -> TokenSet {
        let now = Utc::now();
        // Out-of-range lifetimes fall back to the default rather than overflowing
        let expiry = self
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or_else(|| now + Duration::seconds(Self::DEFAULT_LIFETIME_SECS));
        let scopes = match self.scope.as_deref() {
            Some(s) if !s.trim().is_empty() => s.split_whitespace().map(str::to_string).collect(),
            _ => fallback_scopes.clone(),
        };

        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(fallback_refresh),
            expiry,
            scopes,
        }
    }
}

/// Authorization code returned to the loopback listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    /// Redirect URI the code was issued for; must be echoed in the exchange
    pub redirect_uri: String,
}

/// Token endpoint operations
///
/// Transport failures must surface as [`MailError::Transport`] so the
/// authenticator can retry them; rejected grants as
/// [`MailError::Authentication`].
pub trait TokenEndpoint {
    /// Exchange a refresh token for a new access token
    fn refresh(&self, secret: &ClientSecret, refresh_token: &str) -> Result<TokenResponse>;

    /// Exchange an authorization code for tokens
    fn exchange_code(&self, secret: &ClientSecret, code: &AuthorizationCode) -> Result<TokenResponse>;
}

/// Interactive consent step producing an authorization code
pub trait ConsentFlow {
    fn request_code(&self, secret: &ClientSecret, scopes: &BTreeSet<String>) -> Result<AuthorizationCode>;
}

/// Token endpoint reached over HTTPS at `ClientSecret::token_uri`
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleTokenEndpoint;

/// Error body returned by OAuth2 token endpoints
#[derive(Debug, Default, Deserialize)]
struct OAuthErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

impl GoogleTokenEndpoint {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut response = http_agent()
            .post(url)
            .send_form(form.iter().copied())
            .map_err(|e| MailError::Transport(format!("token endpoint unreachable: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| MailError::Transport(format!("failed to read token response: {e}")))?;

        if (200..300).contains(&status) {
            return serde_json::from_str(&body).context("Failed to parse token response");
        }

        let err: OAuthErrorResponse = serde_json::from_str(&body).unwrap_or_default();
        debug!("Token endpoint returned {}: {}", status, err.error);
        if status >= 500 {
            return Err(MailError::Transport(format!("token endpoint returned HTTP {status}")).into());
        }
        let detail = if err.error_description.is_empty() {
            err.error
        } else {
            format!("{}: {}", err.error, err.error_description)
        };
        Err(MailError::Authentication(format!("token request rejected (HTTP {status}) {detail}")).into())
    }
}

impl TokenEndpoint for GoogleTokenEndpoint {
    fn refresh(&self, secret: &ClientSecret, refresh_token: &str) -> Result<TokenResponse> {
        self.post_form(
            &secret.token_uri,
            &[
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
        )
    }

    fn exchange_code(&self, secret: &ClientSecret, code: &AuthorizationCode) -> Result<TokenResponse> {
        self.post_form(
            &secret.token_uri,
            &[
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("code", code.code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", code.redirect_uri.as_str()),
            ],
        )
    }
}
