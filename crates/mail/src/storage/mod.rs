//! Credential storage
//!
//! The token store abstraction lets the authenticator run against the
//! on-disk credential directory or an in-memory store.

mod file;
mod memory;
mod traits;

pub use file::{CREDENTIALS_FILE, CredentialStore, TOKEN_FILE};
pub use memory::InMemoryTokenStore;
pub use traits::TokenStore;
