//! Authenticated session operations
//!
//! A session performs list/get/send/labels against any [`MailApi`] and
//! translates the responses into the crate's models.

use anyhow::{Context, Result};
use log::{debug, info};

use super::client::{GmailClient, MailApi};
use super::compose::{Payload, build_payload};
use super::normalize::{normalize_full, normalize_summary};
use crate::models::{
    FullMessage, Label, LabelKind, MessageId, MessageRef, MessageSummary, OutboundMessage,
    ThreadId, TokenSet, sort_labels,
};

/// Parameters for listing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Provider search syntax, passed through verbatim
    pub query: String,
    pub max_results: usize,
    pub unread_only: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: Self::DEFAULT_COUNT,
            unread_only: false,
        }
    }
}

impl ListQuery {
    pub const DEFAULT_COUNT: usize = 10;

    /// Largest page the API serves
    const MAX_PAGE_SIZE: usize = 500;

    /// The search string sent to the provider
    pub fn effective_query(&self) -> String {
        if self.unread_only {
            format!("is:unread {}", self.query).trim().to_string()
        } else {
            self.query.trim().to_string()
        }
    }
}

/// An authenticated connection to one mailbox
pub struct Session<A: MailApi> {
    api: A,
}

impl Session<GmailClient> {
    /// Session over the Gmail REST API using `token`
    pub fn from_token(token: &TokenSet) -> Self {
        Self::new(GmailClient::new(token))
    }
}

impl<A: MailApi> Session<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The underlying API
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Lazily list messages matching `query`
    ///
    /// Pages are requested only as the iterator is consumed.
    pub fn list(&self, query: &ListQuery) -> MessageIter<'_, A> {
        MessageIter {
            api: &self.api,
            query: query.effective_query(),
            remaining: query.max_results,
            pending: Vec::new(),
            page_token: None,
            exhausted: query.max_results == 0,
        }
    }

    /// Fetch one message with its decoded body
    pub fn get(&self, message: &MessageRef) -> Result<FullMessage> {
        debug!("Fetching message {}", message.id.as_str());
        let raw = self.api.get_full(&message.id)?;
        Ok(normalize_full(raw))
    }

    /// List all labels, sorted by name
    pub fn list_labels(&self) -> Result<Vec<Label>> {
        let response = self.api.list_labels()?;
        let mut labels: Vec<Label> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| Label {
                kind: LabelKind::from_api(l.label_type.as_deref()),
                id: l.id,
                name: l.name,
            })
            .collect();
        sort_labels(&mut labels);
        Ok(labels)
    }

    /// Email address of the authenticated account
    pub fn account_address(&self) -> Result<String> {
        Ok(self.api.profile()?.email_address)
    }

    /// Build the message without dispatching it
    ///
    /// A missing sender is resolved from the account profile.
    pub fn compose(&self, message: &OutboundMessage) -> Result<Payload> {
        let from = match &message.from {
            Some(from) => from.clone(),
            None => self
                .account_address()
                .context("Failed to determine sender address")?,
        };
        build_payload(message, &from)
    }

    /// Build and dispatch the message; returns the sent message's reference
    pub fn send(&self, message: OutboundMessage) -> Result<MessageRef> {
        let payload = self.compose(&message)?;
        self.dispatch(&payload)
    }

    /// Dispatch an already built payload
    pub fn dispatch(&self, payload: &Payload) -> Result<MessageRef> {
        let response = self.api.send_raw(&payload.to_send_request())?;
        info!("Sent message {}", response.id);
        Ok(MessageRef {
            id: MessageId::new(response.id),
            thread_id: response.thread_id.map(ThreadId::new),
        })
    }
}

/// Lazy, finite iterator over message summaries
///
/// Yields at most `max_results` items, following page tokens as needed.
/// After an error is yielded the iterator ends.
pub struct MessageIter<'a, A: MailApi> {
    api: &'a A,
    query: String,
    remaining: usize,
    pending: Vec<MessageId>,
    page_token: Option<String>,
    exhausted: bool,
}

impl<A: MailApi> MessageIter<'_, A> {
    fn fetch_page(&mut self) -> Result<()> {
        let page_size = self.remaining.min(ListQuery::MAX_PAGE_SIZE);
        let response = self
            .api
            .list_messages(&self.query, page_size, self.page_token.as_deref())?;

        let ids: Vec<MessageId> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect();
        debug!("Fetched page of {} message ids", ids.len());

        self.page_token = response.next_page_token;
        if self.page_token.is_none() || ids.is_empty() {
            self.exhausted = true;
        }
        // Stored reversed so `pop` yields in provider order
        self.pending = ids.into_iter().rev().collect();
        Ok(())
    }
}

impl<A: MailApi> Iterator for MessageIter<'_, A> {
    type Item = Result<MessageSummary>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        if self.pending.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.remaining = 0;
                return Some(Err(e));
            }
        }

        let id = self.pending.pop()?;
        self.remaining -= 1;
        match self.api.get_metadata(&id) {
            Ok(raw) => Some(Ok(normalize_summary(raw))),
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}
