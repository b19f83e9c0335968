//! Storage trait definitions

use anyhow::Result;

use crate::models::TokenSet;

/// Trait for persisting the OAuth token set
///
/// Only the authenticator writes through this trait.
pub trait TokenStore {
    /// Load the stored token set
    ///
    /// Missing, unreadable or corrupt storage yields `None`; never an error.
    fn load(&self) -> Option<TokenSet>;

    /// Persist the token set, replacing any previous one
    fn save(&self, token: &TokenSet) -> Result<()>;

    /// Remove the stored token set; returns whether one existed
    fn clear(&self) -> Result<bool>;
}
