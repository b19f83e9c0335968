//! Gmail OAuth2 authentication
//!
//! Turns stored credentials into a session using the least interactive path:
//! reuse a fresh token, refresh an expired one, or run the consent flow.

use anyhow::Result;
use log::{debug, info, warn};
use std::cell::OnceCell;
use std::path::PathBuf;

use super::callback::LoopbackConsent;
use super::client::GmailClient;
use super::oauth::{ConsentFlow, GoogleTokenEndpoint, TokenEndpoint};
use super::session::Session;
use crate::config::ClientSecret;
use crate::error::{MailError, is_transport_error};
use crate::models::{Scope, TokenSet, scopes_to_request};
use crate::storage::{CredentialStore, TokenStore};

/// OAuth client secret, either given up front or read from disk on first use
enum SecretSource {
    Loaded(ClientSecret),
    File {
        path: PathBuf,
        loaded: OnceCell<ClientSecret>,
    },
}

/// Ensures a valid access token for the scopes an operation needs
///
/// This is the only component that writes the token store. The client
/// secret is only read when a refresh or consent exchange needs it.
pub struct Authenticator<S, E, C> {
    secret: SecretSource,
    store: S,
    endpoint: E,
    consent: C,
}

impl Authenticator<CredentialStore, GoogleTokenEndpoint, LoopbackConsent> {
    /// Authenticator over the on-disk credential store and Google's endpoints
    pub fn from_store(store: CredentialStore) -> Self {
        let path = store.credentials_path();
        Self::with_secret_file(path, store, GoogleTokenEndpoint, LoopbackConsent::default())
    }
}

impl<S: TokenStore, E: TokenEndpoint, C: ConsentFlow> Authenticator<S, E, C> {
    pub fn new(secret: ClientSecret, store: S, endpoint: E, consent: C) -> Self {
        Self {
            secret: SecretSource::Loaded(secret),
            store,
            endpoint,
            consent,
        }
    }

    /// Authenticator reading the client secret from `path` when first needed
    pub fn with_secret_file(path: impl Into<PathBuf>, store: S, endpoint: E, consent: C) -> Self {
        Self {
            secret: SecretSource::File {
                path: path.into(),
                loaded: OnceCell::new(),
            },
            store,
            endpoint,
            consent,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Session over the Gmail REST API holding a token valid for `required`
    pub fn ensure_session(&self, required: &[Scope]) -> Result<Session<GmailClient>> {
        let token = self.ensure_token(required)?;
        Ok(Session::from_token(&token))
    }

    /// Get a token valid for `required`, refreshing or re-consenting as needed
    pub fn ensure_token(&self, required: &[Scope]) -> Result<TokenSet> {
        let Some(stored) = self.store.load() else {
            debug!("No stored token; starting consent flow");
            return self.consent_and_store(required, None);
        };

        if !stored.covers(required) {
            info!("Stored token lacks required scopes; requesting consent again");
            return self.consent_and_store(required, Some(&stored));
        }

        if stored.is_fresh() {
            debug!("Using stored access token");
            return Ok(stored);
        }

        if let Some(refresh_token) = stored.refresh_token.as_deref().filter(|_| stored.can_refresh()) {
            let secret = self.client_secret()?;
            match with_single_retry(|| self.endpoint.refresh(secret, refresh_token)) {
                Ok(response) => {
                    let token = response.into_token_set(Some(refresh_token.to_string()), &stored.scopes);
                    self.store.save(&token)?;
                    info!("Refreshed access token");
                    return Ok(token);
                }
                Err(e) if is_transport_error(&e) => {
                    return Err(MailError::Authentication(format!("token refresh failed: {e:#}")).into());
                }
                Err(e) => warn!("Token refresh rejected, re-authorizing: {:#}", e),
            }
        }

        self.consent_and_store(required, Some(&stored))
    }

    /// Interactive consent, code exchange, scope check and persistence
    fn consent_and_store(&self, required: &[Scope], previous: Option<&TokenSet>) -> Result<TokenSet> {
        let secret = self.client_secret()?;
        let scopes = scopes_to_request(required, previous);
        let code = self.consent.request_code(secret, &scopes)?;

        let response = with_single_retry(|| self.endpoint.exchange_code(secret, &code))
            .map_err(|e| {
                if is_transport_error(&e) {
                    MailError::Authentication(format!("authorization code exchange failed: {e:#}")).into()
                } else {
                    e
                }
            })?;

        let previous_refresh = previous.and_then(|t| t.refresh_token.clone());
        let token = response.into_token_set(previous_refresh, &scopes);
        if !token.covers(required) {
            return Err(MailError::Permission(
                "the granted scopes do not allow this operation; re-run and approve all requested permissions"
                    .to_string(),
            )
            .into());
        }

        self.store.save(&token)?;
        info!("Authorization complete");
        Ok(token)
    }

    fn client_secret(&self) -> Result<&ClientSecret> {
        match &self.secret {
            SecretSource::Loaded(secret) => Ok(secret),
            SecretSource::File { path, loaded } => {
                if let Some(secret) = loaded.get() {
                    return Ok(secret);
                }
                let secret = ClientSecret::from_file(path)?;
                Ok(loaded.get_or_init(|| secret))
            }
        }
    }
}

/// Run `op`, retrying once without delay if it fails at the transport level
fn with_single_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    match op() {
        Err(e) if is_transport_error(&e) => {
            warn!("Transport failure, retrying once: {:#}", e);
            op()
        }
        result => result,
    }
}
