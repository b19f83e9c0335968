//! In-memory mailbox implementing the Gmail API surface
//!
//! Serves the same response shapes as the REST API (including base64url
//! bodies and page tokens) so the session logic runs unchanged against it.
//! Sends and list pages are recorded so tests can assert what was dispatched.

use anyhow::Result;
use base64::prelude::*;
use std::sync::RwLock;

use super::api::{
    GmailMessage, Header, Label as ApiLabel, ListLabelsResponse, ListMessagesResponse,
    MessageBody, MessagePayload, MessageRef as ApiMessageRef, ProfileResponse, SendRequest,
    SendResponse,
};
use super::client::MailApi;
use crate::error::MailError;
use crate::models::{MessageId, UNREAD_LABEL};

/// A message held by the in-memory mailbox
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub thread_id: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub labels: Vec<String>,
}

impl StoredMessage {
    /// Create an inbox message with From and Subject headers
    pub fn new(id: &str, from: &str, subject: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            thread_id: format!("thread-{id}"),
            headers: vec![
                ("From".to_string(), from.to_string()),
                ("Subject".to_string(), subject.to_string()),
                ("Message-ID".to_string(), format!("<{id}@mail.example.com>")),
            ],
            body: body.to_string(),
            labels: vec!["INBOX".to_string()],
        }
    }

    pub fn unread(mut self) -> Self {
        self.labels.push(UNREAD_LABEL.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Minimal Gmail search: `is:unread`, `label:X`, `from:X`, free text on subject/body
    fn matches(&self, query: &str) -> bool {
        query.split_whitespace().all(|term| {
            if term.eq_ignore_ascii_case("is:unread") {
                self.labels.iter().any(|l| l == UNREAD_LABEL)
            } else if let Some(label) = term.strip_prefix("label:") {
                self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
            } else if let Some(from) = term.strip_prefix("from:") {
                self.header("From")
                    .is_some_and(|f| f.to_lowercase().contains(&from.to_lowercase()))
            } else {
                let term = term.to_lowercase();
                self.header("Subject")
                    .is_some_and(|s| s.to_lowercase().contains(&term))
                    || self.body.to_lowercase().contains(&term)
            }
        })
    }

    fn to_api(&self, full: bool) -> GmailMessage {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| Header {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        let data = full.then(|| BASE64_URL_SAFE_NO_PAD.encode(&self.body));

        GmailMessage {
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
            label_ids: Some(self.labels.clone()),
            snippet: self.body.chars().take(100).collect(),
            internal_date: None,
            payload: Some(MessagePayload {
                headers: Some(headers),
                body: Some(MessageBody {
                    size: u32::try_from(self.body.len()).ok(),
                    data,
                }),
                parts: None,
                mime_type: Some("text/plain".to_string()),
            }),
        }
    }
}

/// In-memory implementation of MailApi
///
/// Messages are listed in insertion order.
pub struct InMemoryMailbox {
    address: String,
    messages: RwLock<Vec<StoredMessage>>,
    labels: RwLock<Vec<ApiLabel>>,
    sent: RwLock<Vec<SendRequest>>,
    list_calls: RwLock<usize>,
}

impl InMemoryMailbox {
    /// Create an empty mailbox owned by `address`
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            messages: RwLock::new(Vec::new()),
            labels: RwLock::new(Vec::new()),
            sent: RwLock::new(Vec::new()),
            list_calls: RwLock::new(0),
        }
    }

    pub fn add_message(&self, message: StoredMessage) {
        if let Ok(mut messages) = self.messages.write() {
            messages.push(message);
        }
    }

    pub fn add_label(&self, id: &str, name: &str, user: bool) {
        if let Ok(mut labels) = self.labels.write() {
            labels.push(ApiLabel {
                id: id.to_string(),
                name: name.to_string(),
                label_type: Some(if user { "user" } else { "system" }.to_string()),
            });
        }
    }

    /// Requests passed to `send_raw`, in order
    pub fn sent(&self) -> Vec<SendRequest> {
        self.sent.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of `list_messages` page requests served
    pub fn list_calls(&self) -> usize {
        self.list_calls.read().map(|n| *n).unwrap_or(0)
    }

    fn find(&self, id: &MessageId) -> Result<StoredMessage> {
        let messages = self
            .messages
            .read()
            .map_err(|_| anyhow::anyhow!("mailbox lock poisoned"))?;
        messages
            .iter()
            .find(|m| m.id == id.as_str())
            .cloned()
            .ok_or_else(|| MailError::NotFound(id.as_str().to_string()).into())
    }
}

impl MailApi for InMemoryMailbox {
    fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        if let Ok(mut calls) = self.list_calls.write() {
            *calls += 1;
        }

        let messages = self
            .messages
            .read()
            .map_err(|_| anyhow::anyhow!("mailbox lock poisoned"))?;
        let matching: Vec<&StoredMessage> = messages.iter().filter(|m| m.matches(query)).collect();

        let offset: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| MailError::Api {
                    status: 400,
                    message: format!("Invalid pageToken: {token}"),
                })?,
            None => 0,
        };
        let page_size = max_results.clamp(1, 500);
        let end = (offset + page_size).min(matching.len());
        let page: Vec<ApiMessageRef> = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|m| ApiMessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect();

        Ok(ListMessagesResponse {
            messages: if page.is_empty() { None } else { Some(page) },
            next_page_token: (end < matching.len()).then(|| end.to_string()),
            result_size_estimate: u32::try_from(matching.len()).ok(),
        })
    }

    fn get_metadata(&self, id: &MessageId) -> Result<GmailMessage> {
        Ok(self.find(id)?.to_api(false))
    }

    fn get_full(&self, id: &MessageId) -> Result<GmailMessage> {
        Ok(self.find(id)?.to_api(true))
    }

    fn send_raw(&self, request: &SendRequest) -> Result<SendResponse> {
        let mut sent = self
            .sent
            .write()
            .map_err(|_| anyhow::anyhow!("mailbox lock poisoned"))?;
        sent.push(request.clone());
        let id = format!("sent-{}", sent.len());
        Ok(SendResponse {
            thread_id: Some(request.thread_id.clone().unwrap_or_else(|| format!("thread-{id}"))),
            id,
            label_ids: Some(vec!["SENT".to_string()]),
        })
    }

    fn list_labels(&self) -> Result<ListLabelsResponse> {
        let labels = self
            .labels
            .read()
            .map_err(|_| anyhow::anyhow!("mailbox lock poisoned"))?;
        Ok(ListLabelsResponse {
            labels: Some(labels.clone()),
        })
    }

    fn profile(&self) -> Result<ProfileResponse> {
        let total = self.messages.read().map(|m| m.len() as u64).ok();
        Ok(ProfileResponse {
            email_address: self.address.clone(),
            messages_total: total,
            threads_total: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox() -> InMemoryMailbox {
        let mailbox = InMemoryMailbox::new("me@example.com");
        mailbox.add_message(StoredMessage::new("m1", "boss@example.com", "Budget", "numbers").unread());
        mailbox.add_message(StoredMessage::new("m2", "friend@example.com", "Lunch", "noon?"));
        mailbox.add_message(StoredMessage::new("m3", "boss@example.com", "Offsite", "agenda"));
        mailbox
    }

    #[test]
    fn test_query_filters() {
        let mb = mailbox();
        let ids = |q: &str| -> Vec<String> {
            mb.list_messages(q, 10, None)
                .unwrap()
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.id)
                .collect()
        };
        assert_eq!(ids("is:unread"), vec!["m1"]);
        assert_eq!(ids("from:boss"), vec!["m1", "m3"]);
        assert_eq!(ids("lunch"), vec!["m2"]);
        assert_eq!(ids(""), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_pagination_tokens() {
        let mb = mailbox();
        let first = mb.list_messages("", 2, None).unwrap();
        assert_eq!(first.messages.unwrap().len(), 2);
        let token = first.next_page_token.unwrap();

        let second = mb.list_messages("", 2, Some(&token)).unwrap();
        assert_eq!(second.messages.unwrap().len(), 1);
        assert!(second.next_page_token.is_none());
        assert_eq!(mb.list_calls(), 2);
    }

    #[test]
    fn test_missing_message_is_not_found() {
        let err = mailbox().get_full(&MessageId::new("nope")).unwrap_err();
        assert!(matches!(err.downcast_ref::<MailError>(), Some(MailError::NotFound(_))));
    }

    #[test]
    fn test_full_body_is_base64url() {
        let msg = mailbox().get_full(&MessageId::new("m2")).unwrap();
        let data = msg.payload.unwrap().body.unwrap().data.unwrap();
        assert_eq!(BASE64_URL_SAFE_NO_PAD.decode(data).unwrap(), b"noon?");
    }

    #[test]
    fn test_send_records_requests() {
        let mb = mailbox();
        let response = mb
            .send_raw(&SendRequest {
                raw: "cmF3".into(),
                thread_id: Some("t9".into()),
            })
            .unwrap();
        assert_eq!(response.thread_id.as_deref(), Some("t9"));
        assert_eq!(mb.sent().len(), 1);
    }
}
