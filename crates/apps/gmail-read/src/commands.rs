//! Command dispatch

use anyhow::{Context, Result};
use log::{debug, info};
use mail::gmail::build_payload;
use mail::models::split_addresses;
use mail::{
    Authenticator, CredentialStore, FullMessage, ListQuery, MailApi, MessageRef, OutboundMessage,
    Scope, Session, TokenStore,
};
use std::io::{self, Read, Write};

use crate::cli::{Action, Cli, SendArgs};
use crate::render;

/// Run one invocation against the user's Gmail account
pub fn run(cli: &Cli) -> Result<()> {
    let store = CredentialStore::open_default()?;
    debug!("Using config directory {}", store.dir().display());
    let mut out = io::stdout().lock();

    let action = cli.action();
    if let Action::Logout = action {
        return logout(&store, &mut out);
    }

    // Read stdin before any consent prompt
    let body = match action {
        Action::Send(args) => Some(read_body(args, io::stdin().lock())?),
        _ => None,
    };

    if let Action::Send(args) = action
        && let Some(from) = offline_sender(args)
    {
        return preview_offline(args, from, body.unwrap_or_default(), cli.json, &mut out);
    }

    let auth = Authenticator::from_store(store);
    let session = auth.ensure_session(&required_scopes(action))?;
    execute(&session, cli, body, &mut out)
}

fn logout(store: &impl TokenStore, out: &mut impl Write) -> Result<()> {
    if store.clear()? {
        info!("Token removed");
        writeln!(out, "Logged out.")?;
    } else {
        writeln!(out, "No stored token.")?;
    }
    Ok(())
}

/// Scopes the token must grant for `action`
pub fn required_scopes(action: Action<'_>) -> Vec<Scope> {
    match action {
        Action::Logout => Vec::new(),
        Action::Labels | Action::Read(_) | Action::List => vec![Scope::Read],
        Action::Send(args) => {
            // Replies fetch the original; a missing sender is looked up in the profile
            if args.reply_to.is_some() || args.from.is_none() {
                vec![Scope::Read, Scope::Send]
            } else {
                vec![Scope::Send]
            }
        }
    }
}

/// Sender of a dry run that can be built without contacting the API
pub fn offline_sender(args: &SendArgs) -> Option<&str> {
    if args.dry_run && args.reply_to.is_none() {
        args.from.as_deref()
    } else {
        None
    }
}

fn preview_offline(
    args: &SendArgs,
    from: &str,
    body: String,
    as_json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let message = build_outbound(args, body, None);
    let payload = build_payload(&message, from)?;
    info!("Dry run; message not sent");
    render::payload(out, &payload, as_json)
}

/// Message body from `--body` or, with `--body-stdin`, from `stdin`
pub fn read_body(args: &SendArgs, mut stdin: impl Read) -> Result<String> {
    if args.body_stdin {
        let mut body = String::new();
        stdin
            .read_to_string(&mut body)
            .context("Failed to read message body from stdin")?;
        Ok(body)
    } else {
        Ok(args.body.clone().unwrap_or_default())
    }
}

/// Perform `cli`'s action on an authenticated session
pub fn execute<A: MailApi>(
    session: &Session<A>,
    cli: &Cli,
    body: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    match cli.action() {
        // Handled before authentication
        Action::Logout => Ok(()),
        Action::Labels => render::labels(out, &session.list_labels()?, cli.json),
        Action::Read(id) => render::message(out, &session.get(&MessageRef::new(id))?, cli.json),
        Action::List => {
            let query = ListQuery {
                query: cli.query.clone(),
                max_results: cli.count,
                unread_only: cli.unread,
            };
            render::summaries(out, session.list(&query), cli.json)
        }
        Action::Send(args) => send(session, args, body.unwrap_or_default(), cli.json, out),
    }
}

fn send<A: MailApi>(
    session: &Session<A>,
    args: &SendArgs,
    body: String,
    as_json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let original = match &args.reply_to {
        Some(id) => Some(
            session
                .get(&MessageRef::new(id.as_str()))
                .with_context(|| format!("Failed to fetch message {id} to reply to"))?,
        ),
        None => None,
    };

    let message = build_outbound(args, body, original.as_ref());
    let payload = session.compose(&message)?;
    if args.dry_run {
        info!("Dry run; message not sent");
        return render::payload(out, &payload, as_json);
    }

    let sent = session.dispatch(&payload)?;
    render::sent(out, &sent, as_json)
}

/// Outgoing message from flags, overlaid on reply defaults when replying
pub fn build_outbound(args: &SendArgs, body: String, original: Option<&FullMessage>) -> OutboundMessage {
    let mut message = original.map(OutboundMessage::reply_to).unwrap_or_default();

    let to = split_addresses(args.to.iter().map(String::as_str));
    if !to.is_empty() {
        message.to = to;
    }
    message.cc = split_addresses(args.cc.iter().map(String::as_str));
    message.bcc = split_addresses(args.bcc.iter().map(String::as_str));
    message.from = args.from.clone();
    if let Some(subject) = &args.subject {
        message.subject = subject.clone();
    }
    message.body = body;
    message
}
