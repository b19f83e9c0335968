//! Domain models for mail entities

mod label;
mod message;
mod outbound;
mod token;

pub use label::{Label, LabelKind, sort_labels};
pub use message::{
    FullMessage, MessageId, MessageRef, MessageSummary, NO_SUBJECT, ThreadId,
    UNREAD_LABEL,
};
pub use outbound::{OutboundMessage, ReplyContext, reply_subject, split_addresses};
pub use token::{Scope, TokenSet, scopes_to_request};
