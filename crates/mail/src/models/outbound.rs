//! Outgoing messages and reply derivation

use serde::Serialize;

use super::{FullMessage, MessageRef};

/// Threading information copied from the message being replied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyContext {
    /// The original message (its thread id is reused for the reply)
    pub in_reply_to: MessageRef,
    /// Original Message-ID header, for In-Reply-To/References
    pub message_id_header: Option<String>,
    /// Original References header, extended with the Message-ID
    pub references: Option<String>,
}

impl ReplyContext {
    /// The References value for the reply: original chain plus its Message-ID
    pub fn reply_references(&self) -> Option<String> {
        let mut chain: Vec<&str> = self
            .references
            .as_deref()
            .map(|r| r.split_whitespace().collect())
            .unwrap_or_default();
        if let Some(id) = self.message_id_header.as_deref()
            && !chain.contains(&id)
        {
            chain.push(id);
        }
        if chain.is_empty() {
            None
        } else {
            Some(chain.join(" "))
        }
    }
}

/// A message to be sent; consumed once by the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    /// Sender; resolved from the account profile when absent
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub reply: Option<ReplyContext>,
}

impl OutboundMessage {
    /// Start a reply to `original`: To, Subject and threading prefilled
    pub fn reply_to(original: &FullMessage) -> Self {
        let recipient = original
            .reply_to
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(original.from.as_str());

        Self {
            to: split_addresses([recipient]),
            subject: reply_subject(&original.subject),
            reply: Some(ReplyContext {
                in_reply_to: original.message_ref(),
                message_id_header: original.message_id_header.clone(),
                references: original.references.clone(),
            }),
            ..Self::default()
        }
    }

    /// The message this one replies to, if any
    pub fn in_reply_to(&self) -> Option<&MessageRef> {
        self.reply.as_ref().map(|r| &r.in_reply_to)
    }

    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}

/// Prefix a subject with "Re: " unless it already carries a reply prefix
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    let already_reply = trimmed
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));
    if already_reply {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

/// Flatten comma-separated and repeated address arguments
///
/// Commas inside a quoted display name or inside angle brackets do not split.
pub fn split_addresses<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        for c in value.chars() {
            match c {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    push_address(&mut out, &current);
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(c);
        }
        push_address(&mut out, &current);
    }
    out
}

fn push_address(out: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
