//! Gmail API response normalization
//!
//! Converts Gmail API responses to summaries and full messages.

use base64::prelude::*;

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::{FullMessage, MessageId, MessageSummary, NO_SUBJECT, ThreadId};

/// Normalize a metadata-format message into a listing summary
pub fn normalize_summary(gmail_msg: GmailMessage) -> MessageSummary {
    let payload = gmail_msg.payload.as_ref();
    let header = |name: &str| payload.and_then(|p| extract_header(p, name));

    MessageSummary {
        id: MessageId::new(&gmail_msg.id),
        thread_id: ThreadId::new(&gmail_msg.thread_id),
        from: header("From").unwrap_or_default(),
        to: header("To").unwrap_or_default(),
        subject: header("Subject")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        date: header("Date").unwrap_or_default(),
        snippet: decode_html_entities(&gmail_msg.snippet),
        labels: gmail_msg.label_ids.unwrap_or_default(),
    }
}

/// Normalize a full-format message, decoding its body
pub fn normalize_full(gmail_msg: GmailMessage) -> FullMessage {
    let payload = gmail_msg.payload.as_ref();
    let header = |name: &str| payload.and_then(|p| extract_header(p, name));

    let body = payload.and_then(extract_body).unwrap_or_default();

    FullMessage {
        id: MessageId::new(&gmail_msg.id),
        thread_id: ThreadId::new(&gmail_msg.thread_id),
        from: header("From").unwrap_or_default(),
        to: header("To").unwrap_or_default(),
        cc: header("Cc").unwrap_or_default(),
        subject: header("Subject")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string()),
        date: header("Date").unwrap_or_default(),
        body,
        labels: gmail_msg.label_ids.clone().unwrap_or_default(),
        message_id_header: header("Message-ID"),
        references: header("References"),
        reply_to: header("Reply-To"),
    }
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Pick the readable body: text/plain, then text/html, then any body data
fn extract_body(payload: &MessagePayload) -> Option<String> {
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_ref())
        && is_mime(payload.mime_type.as_deref(), "text/plain")
    {
        return decode_base64_body(data);
    }

    if let Some(parts) = &payload.parts {
        if let Some(text) = find_in_parts(parts, "text/plain") {
            return Some(text);
        }
        if let Some(html) = find_in_parts(parts, "text/html") {
            return Some(html);
        }
    }

    payload
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .and_then(decode_base64_body)
}

fn is_mime(mime_type: Option<&str>, wanted: &str) -> bool {
    mime_type.is_some_and(|m| m.starts_with(wanted))
}

/// Recursively search message parts for content of the given type
fn find_in_parts(parts: &[MessagePart], mime: &str) -> Option<String> {
    for part in parts {
        if is_mime(part.mime_type.as_deref(), mime)
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        if let Some(nested) = &part.parts
            && let Some(text) = find_in_parts(nested, mime)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
/// Invalid UTF-8 is replaced rather than rejected.
pub fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders
        .iter()
        .find_map(|decoder| decoder.decode(data).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
