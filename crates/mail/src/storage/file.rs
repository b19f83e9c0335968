//! On-disk credential store (~/.gmail-read/)

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use super::TokenStore;
use crate::config::ClientSecret;
use crate::models::TokenSet;

/// Token filename in the config directory
pub const TOKEN_FILE: &str = "token.json";
/// Client-secret filename in the config directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Token and client-secret files in one config directory
///
/// Saves are atomic (temp file + rename) but not locked: two processes
/// refreshing at once may each overwrite the other's token.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Store rooted at an explicit directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the user's config directory
    pub fn open_default() -> Result<Self> {
        let dir = ::config::config_dir().context("Could not determine config directory")?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    /// Load the OAuth client secret
    ///
    /// Fails with a configuration error when the file is missing.
    pub fn load_client_secret(&self) -> Result<ClientSecret> {
        ClientSecret::from_file(&self.credentials_path())
    }
}

impl TokenStore for CredentialStore {
    fn load(&self) -> Option<TokenSet> {
        let path = self.token_path();
        if !path.exists() {
            debug!("No token file at {}", path.display());
            return None;
        }

        match ::config::load_json_file::<TokenSet>(&path) {
            Ok(token) => Some(token),
            Err(e) => {
                debug!("Ignoring unusable token file: {:#}", e);
                None
            }
        }
    }

    fn save(&self, token: &TokenSet) -> Result<()> {
        ::config::save_json_file(&self.token_path(), token).context("Failed to save token")
    }

    fn clear(&self) -> Result<bool> {
        ::config::remove_file(&self.token_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_token() -> TokenSet {
        TokenSet {
            access_token: "ya29.access".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
            scopes: [Scope::Read.url().to_string(), Scope::Send.url().to_string()]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path());
        let token = sample_token();

        store.save(&token).unwrap();
        assert_eq!(store.load(), Some(token));
    }

    #[test]
    fn test_save_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path().join("fresh"));
        store.save(&sample_token()).unwrap();
        assert!(store.token_path().exists());
    }

    #[test]
    fn test_load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path());
        std::fs::write(store.token_path(), "{ not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_clear_removes_token() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path());
        store.save(&sample_token()).unwrap();

        assert!(store.clear().unwrap());
        assert_eq!(store.load(), None);
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn test_load_client_secret() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path());
        std::fs::write(
            store.credentials_path(),
            r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();

        let secret = store.load_client_secret().unwrap();
        assert_eq!(secret.client_id, "id");
    }

    #[test]
    fn test_missing_client_secret_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let store = CredentialStore::new(tmp.path());
        let err = store.load_client_secret().unwrap_err();
        assert_eq!(crate::error::exit_code_for(&err), 7);
    }
}
