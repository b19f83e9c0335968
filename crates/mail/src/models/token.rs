//! OAuth token set and Gmail scopes

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Full mailbox access; satisfies every scope
const FULL_ACCESS: &str = "https://mail.google.com/";
const MODIFY: &str = "https://www.googleapis.com/auth/gmail.modify";
const COMPOSE: &str = "https://www.googleapis.com/auth/gmail.compose";

/// A permission the current operation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Read messages, labels and the account profile
    Read,
    /// Send messages
    Send,
}

impl Scope {
    /// OAuth scope URL requested for this permission
    pub fn url(self) -> &'static str {
        match self {
            Self::Read => "https://www.googleapis.com/auth/gmail.readonly",
            Self::Send => "https://www.googleapis.com/auth/gmail.send",
        }
    }

    /// Whether a granted scope URL covers this permission
    pub fn satisfied_by(self, granted: &str) -> bool {
        if granted == self.url() || granted == FULL_ACCESS || granted == MODIFY {
            return true;
        }
        self == Self::Send && granted == COMPOSE
    }
}

/// Access/refresh token pair as persisted in token.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl TokenSet {
    /// Tokens expiring within this window are treated as expired
    pub const EXPIRY_SKEW_SECS: i64 = 60;

    /// Whether the access token is usable at `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expiry > now + Duration::seconds(Self::EXPIRY_SKEW_SECS)
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the granted scopes cover every required permission
    pub fn covers(&self, required: &[Scope]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| scope.satisfied_by(granted)))
    }
}

/// Scope URLs to request: the required ones plus whatever was granted before
pub fn scopes_to_request(required: &[Scope], previous: Option<&TokenSet>) -> BTreeSet<String> {
    let mut scopes: BTreeSet<String> = required.iter().map(|s| s.url().to_string()).collect();
    if let Some(token) = previous {
        scopes.extend(token.scopes.iter().cloned());
    }
    scopes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: i64, scopes: &[&str]) -> TokenSet {
        TokenSet {
            access_token: "access".to_string(),
            refresh_token: None,
            expiry: Utc::now() + Duration::seconds(expires_in),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_freshness_respects_skew() {
        assert!(token(3600, &[]).is_fresh());
        assert!(!token(30, &[]).is_fresh());
        assert!(!token(-10, &[]).is_fresh());
    }

    #[test]
    fn test_empty_access_token_is_not_fresh() {
        let mut t = token(3600, &[]);
        t.access_token.clear();
        assert!(!t.is_fresh());
    }

    #[test]
    fn test_covers_exact_scopes() {
        let t = token(3600, &[Scope::Read.url()]);
        assert!(t.covers(&[Scope::Read]));
        assert!(!t.covers(&[Scope::Read, Scope::Send]));
        assert!(t.covers(&[]));
    }

    #[test]
    fn test_broader_scopes_satisfy() {
        let full = token(3600, &[FULL_ACCESS]);
        assert!(full.covers(&[Scope::Read, Scope::Send]));

        let compose = token(3600, &[COMPOSE]);
        assert!(compose.covers(&[Scope::Send]));
        assert!(!compose.covers(&[Scope::Read]));
    }

    #[test]
    fn test_scopes_to_request_keeps_previous_grants() {
        let previous = token(0, &[Scope::Read.url()]);
        let scopes = scopes_to_request(&[Scope::Send], Some(&previous));
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains(Scope::Read.url()));
        assert!(scopes.contains(Scope::Send.url()));
    }

    #[test]
    fn test_token_json_shape() {
        let t = token(3600, &[Scope::Read.url()]);
        let value = serde_json::to_value(&t).unwrap();
        assert!(value.get("access_token").is_some());
        assert!(value.get("refresh_token").is_none());
        assert!(value.get("expiry").is_some());
        assert_eq!(value["scopes"][0], Scope::Read.url());
    }
}
