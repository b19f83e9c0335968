//! Terminal and JSON output

use anyhow::Result;
use mail::{FullMessage, Label, MessageRef, MessageSummary, Payload};
use serde::Serialize;
use std::io::Write;

const RULE_WIDTH: usize = 60;

fn json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// One listing line: unread marker, short id, sender and subject columns
pub fn summary_line(summary: &MessageSummary) -> String {
    let marker = if summary.is_unread() { '*' } else { ' ' };
    format!(
        "{marker} {:.12}  {:<30.30}  {:<50.50}",
        summary.id.as_str(),
        summary.from,
        summary.subject
    )
}

/// Write summaries as they arrive; stops at the first error
pub fn summaries(
    out: &mut impl Write,
    items: impl Iterator<Item = Result<MessageSummary>>,
    as_json: bool,
) -> Result<()> {
    if as_json {
        let all: Vec<MessageSummary> = items.collect::<Result<_>>()?;
        return json(out, &all);
    }

    let mut any = false;
    for summary in items {
        writeln!(out, "{}", summary_line(&summary?))?;
        any = true;
    }
    if !any {
        writeln!(out, "No messages found.")?;
    }
    Ok(())
}

pub fn message(out: &mut impl Write, msg: &FullMessage, as_json: bool) -> Result<()> {
    if as_json {
        return json(out, msg);
    }

    writeln!(out, "From:    {}", msg.from)?;
    writeln!(out, "To:      {}", msg.to)?;
    writeln!(out, "Date:    {}", msg.date)?;
    writeln!(out, "Subject: {}", msg.subject)?;
    writeln!(out, "Labels:  {}", msg.labels.join(", "))?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    writeln!(out, "{}", msg.body)?;
    Ok(())
}

pub fn labels(out: &mut impl Write, labels: &[Label], as_json: bool) -> Result<()> {
    if as_json {
        return json(out, labels);
    }

    for label in labels {
        writeln!(out, "{:<30} (id: {})", label.name, label.id)?;
    }
    Ok(())
}

/// Dry-run output: the message exactly as it would be sent
pub fn payload(out: &mut impl Write, payload: &Payload, as_json: bool) -> Result<()> {
    if as_json {
        return json(out, payload);
    }
    writeln!(out, "{}", payload.raw.trim_end())?;
    Ok(())
}

pub fn sent(out: &mut impl Write, sent: &MessageRef, as_json: bool) -> Result<()> {
    if as_json {
        return json(out, sent);
    }
    writeln!(out, "Message sent (id: {})", sent.id.as_str())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail::models::{MessageId, ThreadId};

    fn summary(id: &str, from: &str, subject: &str, unread: bool) -> MessageSummary {
        MessageSummary {
            id: MessageId::new(id),
            thread_id: ThreadId::new("t"),
            from: from.into(),
            to: String::new(),
            subject: subject.into(),
            date: String::new(),
            snippet: String::new(),
            labels: if unread { vec!["UNREAD".into()] } else { vec![] },
        }
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_summary_line_columns() {
        let line = summary_line(&summary("18c2f5a9b0d1e2f3", "Alice <alice@example.com>", "Hello", true));
        assert!(line.starts_with("* 18c2f5a9b0d1  Alice <alice@example.com>"));
        assert_eq!(line.chars().count(), 2 + 12 + 2 + 30 + 2 + 50);
    }

    #[test]
    fn test_summary_line_truncates_long_fields() {
        let from = "x".repeat(45);
        let line = summary_line(&summary("abc", &from, "s", false));
        assert!(line.starts_with("  abc  "));
        assert!(line.contains(&format!("{}  s", "x".repeat(30))));
    }

    #[test]
    fn test_empty_listing() {
        let text = output(|out| summaries(out, std::iter::empty(), false));
        assert_eq!(text, "No messages found.\n");
    }

    #[test]
    fn test_listing_json() {
        let items = vec![Ok(summary("a", "f", "s", true))];
        let text = output(|out| summaries(out, items.into_iter(), true));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["id"], "a");
        assert_eq!(value[0]["labels"][0], "UNREAD");
    }

    #[test]
    fn test_labels_format() {
        let list = vec![Label {
            id: "Label_1".into(),
            name: "Receipts".into(),
            kind: mail::LabelKind::User,
        }];
        let text = output(|out| labels(out, &list, false));
        assert_eq!(text, format!("{:<30} (id: Label_1)\n", "Receipts"));
    }
}
