//! Message models for the list/read/send vocabulary

use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a thread (Gmail thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Address of one remote message and, when known, its thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: MessageId,
    pub thread_id: Option<ThreadId>,
}

impl MessageRef {
    /// Reference a message by id alone
    pub fn new(id: impl Into<MessageId>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }

    /// Reference a message together with its thread
    pub fn with_thread(id: impl Into<MessageId>, thread_id: ThreadId) -> Self {
        Self {
            id: id.into(),
            thread_id: Some(thread_id),
        }
    }
}

/// Label marking unread messages
pub const UNREAD_LABEL: &str = "UNREAD";

/// Placeholder shown for messages without a Subject header
pub const NO_SUBJECT: &str = "(no subject)";

/// Header-level view of a message, as shown in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
    pub snippet: String,
    pub labels: Vec<String>,
}

impl MessageSummary {
    pub fn is_unread(&self) -> bool {
        self.labels.iter().any(|l| l == UNREAD_LABEL)
    }

    pub fn message_ref(&self) -> MessageRef {
        MessageRef::with_thread(self.id.clone(), self.thread_id.clone())
    }
}

/// A message with its decoded body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub date: String,
    pub body: String,
    pub labels: Vec<String>,
    /// RFC 5322 Message-ID header, used for reply threading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl FullMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef::with_thread(self.id.clone(), self.thread_id.clone())
    }
}
