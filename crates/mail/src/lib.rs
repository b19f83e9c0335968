//! Mail crate - Gmail access for the command line
//!
//! This crate provides:
//! - Domain models (summaries, full messages, labels, tokens)
//! - OAuth2 authentication with refresh and loopback consent
//! - A Gmail REST client and an in-memory mailbox behind one trait
//! - Session operations: list, read, labels, compose, send
//! - Credential storage under the user's config directory
//!
//! This crate has no terminal dependencies; rendering lives in the app.

pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod storage;

pub use self::config::ClientSecret;
pub use error::{MailError, exit_code_for, is_transport_error};
pub use gmail::{
    Authenticator, GmailClient, InMemoryMailbox, ListQuery, LoopbackConsent, MailApi,
    MessageIter, Payload, Session, StoredMessage,
};
pub use models::{
    FullMessage, Label, LabelKind, MessageId, MessageRef, MessageSummary,
    OutboundMessage, Scope, ThreadId, TokenSet,
};
pub use storage::{CredentialStore, InMemoryTokenStore, TokenStore};
