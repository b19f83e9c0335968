//! OAuth client-secret loading
//!
//! Accepts the Google Cloud Console download (`{"installed": {...}}` or
//! `{"web": {...}}`) as well as a flat object with the same fields.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use crate::error::MailError;

/// Google's OAuth2 authorization endpoint
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's OAuth2 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client issued by the provider console
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialFile {
    Flat(ClientSecret),
    Wrapped {
        installed: Option<ClientSecret>,
        web: Option<ClientSecret>,
    },
}

impl ClientSecret {
    /// Load the client secret from `path`
    ///
    /// A missing or unparseable file is a [`MailError::Configuration`].
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MailError::Configuration(format!(
                "No credentials file found at {}. Create an OAuth 2.0 Client ID (Desktop app) at \
                 https://console.cloud.google.com/apis/credentials and save its JSON there",
                path.display()
            ))
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            MailError::Configuration(format!(
                "Failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content).map_err(|e| {
            MailError::Configuration(format!("Invalid credentials file {}: {}", path.display(), e))
                .into()
        })
    }

    /// Parse a client secret from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CredentialFile = serde_json::from_str(json)
            .map_err(|e| MailError::Configuration(format!("Failed to parse credentials JSON: {e}")))?;

        let secret = match file {
            CredentialFile::Flat(secret) => secret,
            CredentialFile::Wrapped { installed, web } => installed.or(web).ok_or_else(|| {
                MailError::Configuration(
                    "Credentials file missing 'installed' or 'web' section".to_string(),
                )
            })?,
        };

        if secret.client_id.is_empty() {
            return Err(MailError::Configuration("Credentials file has an empty client_id".into()).into());
        }
        Ok(secret)
    }
}
