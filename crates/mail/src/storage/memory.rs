//! In-memory token store
//!
//! Used in tests to observe how often the authenticator persists tokens.

use anyhow::Result;
use std::sync::RwLock;

use super::TokenStore;
use crate::models::TokenSet;

/// In-memory implementation of TokenStore that counts writes
#[derive(Default)]
pub struct InMemoryTokenStore {
    token: RwLock<Option<TokenSet>>,
    saves: RwLock<usize>,
}

impl InMemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `token`
    pub fn with_token(token: TokenSet) -> Self {
        Self {
            token: RwLock::new(Some(token)),
            saves: RwLock::new(0),
        }
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }

    /// Current token without going through `load`
    pub fn current(&self) -> Option<TokenSet> {
        self.token.read().ok().and_then(|t| t.clone())
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Option<TokenSet> {
        self.current()
    }

    fn save(&self, token: &TokenSet) -> Result<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        *slot = Some(token.clone());
        if let Ok(mut saves) = self.saves.write() {
            *saves += 1;
        }
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))?;
        Ok(slot.take().is_some())
    }
}
