//! RFC 5322 message construction for messages.send
//!
//! MIME generation is delegated to lettre's message builder.

use anyhow::{Context, Result};
use base64::prelude::*;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use serde::Serialize;

use super::api::SendRequest;
use crate::models::OutboundMessage;

/// A fully built message, ready for dispatch or display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub from: String,
    /// Thread the message is sent into, for replies
    pub thread_id: Option<String>,
    /// RFC 5322 text
    pub raw: String,
}

impl Payload {
    /// Request body for messages.send
    pub fn to_send_request(&self) -> SendRequest {
        SendRequest {
            raw: BASE64_URL_SAFE_NO_PAD.encode(self.raw.as_bytes()),
            thread_id: self.thread_id.clone(),
        }
    }
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .trim()
        .parse::<Mailbox>()
        .with_context(|| format!("Invalid {field} address: {value}"))
}

/// Build the payload for `msg` sent by `from`
pub fn build_payload(msg: &OutboundMessage, from: &str) -> Result<Payload> {
    if !msg.has_recipients() {
        anyhow::bail!("No recipients: pass at least one of --to, --cc or --bcc");
    }

    let mut builder = Message::builder()
        .from(parse_mailbox("From", from)?)
        .subject(msg.subject.as_str())
        // Gmail has no separate envelope, so Bcc must stay in the message
        .keep_bcc();
    for addr in &msg.to {
        builder = builder.to(parse_mailbox("To", addr)?);
    }
    for addr in &msg.cc {
        builder = builder.cc(parse_mailbox("Cc", addr)?);
    }
    for addr in &msg.bcc {
        builder = builder.bcc(parse_mailbox("Bcc", addr)?);
    }

    let mut thread_id = None;
    if let Some(reply) = &msg.reply {
        if let Some(id) = &reply.message_id_header {
            builder = builder.in_reply_to(id.clone());
        }
        if let Some(refs) = reply.reply_references() {
            builder = builder.references(refs);
        }
        thread_id = reply.in_reply_to.thread_id.as_ref().map(|t| t.as_str().to_string());
    }

    let email = builder
        .header(ContentType::TEXT_PLAIN)
        .body(msg.body.clone())
        .context("Failed to build message")?;

    Ok(Payload {
        from: from.to_string(),
        thread_id,
        raw: String::from_utf8_lossy(&email.formatted()).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageRef, ReplyContext, ThreadId};

    fn simple() -> OutboundMessage {
        OutboundMessage {
            to: vec!["a@b.com".into()],
            subject: "Hi".into(),
            body: "Hello".into(),
            ..OutboundMessage::default()
        }
    }

    #[test]
    fn test_simple_payload_headers() {
        let payload = build_payload(&simple(), "me@example.com").unwrap();
        assert!(payload.raw.contains("From: me@example.com"));
        assert!(payload.raw.contains("To: a@b.com"));
        assert!(payload.raw.contains("Subject: Hi"));
        assert!(payload.raw.contains("Hello"));
        assert_eq!(payload.thread_id, None);
    }

    #[test]
    fn test_bcc_is_kept() {
        let mut msg = simple();
        msg.bcc.push("hidden@example.com".into());
        let payload = build_payload(&msg, "me@example.com").unwrap();
        assert!(payload.raw.contains("Bcc: hidden@example.com"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let mut msg = simple();
        msg.subject = "Grüße".into();
        let payload = build_payload(&msg, "me@example.com").unwrap();
        assert!(payload.raw.contains("Subject: =?"));
        assert!(!payload.raw.contains("Grüße"));
    }

    #[test]
    fn test_reply_threading_headers() {
        let mut msg = simple();
        msg.reply = Some(ReplyContext {
            in_reply_to: MessageRef::with_thread("orig", ThreadId::new("thread9")),
            message_id_header: Some("<orig@mail>".into()),
            references: Some("<root@mail>".into()),
        });

        let payload = build_payload(&msg, "me@example.com").unwrap();
        assert_eq!(payload.thread_id.as_deref(), Some("thread9"));
        assert!(payload.raw.contains("In-Reply-To: <orig@mail>"));
        assert!(payload.raw.contains("References: <root@mail> <orig@mail>"));
    }

    #[test]
    fn test_no_recipients_rejected() {
        let mut msg = simple();
        msg.to.clear();
        assert!(build_payload(&msg, "me@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut msg = simple();
        msg.to = vec!["not an address".into()];
        let err = build_payload(&msg, "me@example.com").unwrap_err();
        assert!(err.to_string().contains("Invalid To address"));
    }

    #[test]
    fn test_send_request_is_base64url() {
        let payload = build_payload(&simple(), "me@example.com").unwrap();
        let request = payload.to_send_request();
        let decoded = BASE64_URL_SAFE_NO_PAD.decode(&request.raw).unwrap();
        assert_eq!(decoded, payload.raw.as_bytes());
    }
}
