//! Command-line arguments

use clap::{Args, Parser, Subcommand};

/// Read and send Gmail from the command line
#[derive(Debug, Parser)]
#[command(name = "gmail-read", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Number of messages to list
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Show only unread messages
    #[arg(short, long)]
    pub unread: bool,

    /// Gmail search query (e.g. 'from:someone@example.com')
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Read a specific message by ID
    #[arg(short, long)]
    pub id: Option<String>,

    /// List available labels
    #[arg(short, long)]
    pub labels: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Delete the stored token and exit
    #[arg(long)]
    pub logout: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compose and send a message
    Send(SendArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SendArgs {
    /// Recipient(s), comma separated or repeated
    #[arg(long)]
    pub to: Vec<String>,

    /// Carbon-copy recipient(s)
    #[arg(long)]
    pub cc: Vec<String>,

    /// Blind carbon-copy recipient(s)
    #[arg(long)]
    pub bcc: Vec<String>,

    /// Sender address (defaults to the authenticated account)
    #[arg(long)]
    pub from: Option<String>,

    #[arg(short, long)]
    pub subject: Option<String>,

    #[arg(short, long, conflicts_with = "body_stdin")]
    pub body: Option<String>,

    /// Read the body from standard input
    #[arg(long)]
    pub body_stdin: bool,

    /// Reply to the message with this ID
    #[arg(long, value_name = "MESSAGE_ID")]
    pub reply_to: Option<String>,

    /// Print the message instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

/// What one invocation does
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    Logout,
    Labels,
    Read(&'a str),
    List,
    Send(&'a SendArgs),
}

impl Cli {
    /// Resolve the flags into a single action; earlier flags take precedence
    pub fn action(&self) -> Action<'_> {
        if self.logout {
            return Action::Logout;
        }
        if let Some(Command::Send(args)) = &self.command {
            return Action::Send(args);
        }
        if self.labels {
            Action::Labels
        } else if let Some(id) = &self.id {
            Action::Read(id)
        } else {
            Action::List
        }
    }
}

/// Exit code for a parse failure: help and version succeed, usage errors exit 1
pub fn parse_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gmail-read").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_to_list() {
        let cli = parse(&[]);
        assert!(matches!(cli.action(), Action::List));
        assert_eq!(cli.count, 10);
        assert!(!cli.unread);
        assert_eq!(cli.query, "");
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&["-n", "5", "-u", "-q", "from:boss"]);
        assert_eq!(cli.count, 5);
        assert!(cli.unread);
        assert_eq!(cli.query, "from:boss");

        assert!(matches!(parse(&["-i", "abc"]).action(), Action::Read("abc")));
        assert!(matches!(parse(&["-l"]).action(), Action::Labels));
        assert!(matches!(parse(&["-l", "--logout"]).action(), Action::Logout));
    }

    #[test]
    fn test_send_args() {
        let cli = parse(&[
            "send", "--to", "a@b.com,c@d.com", "--to", "e@f.com", "-s", "Hi", "-b", "Hello",
            "--dry-run", "--json",
        ]);
        let Action::Send(args) = cli.action() else {
            panic!("expected send");
        };
        assert_eq!(args.to, vec!["a@b.com,c@d.com", "e@f.com"]);
        assert_eq!(args.subject.as_deref(), Some("Hi"));
        assert_eq!(args.body.as_deref(), Some("Hello"));
        assert!(args.dry_run);
        assert!(cli.json);
    }

    #[test]
    fn test_body_conflicts_with_stdin() {
        let result = Cli::try_parse_from(["gmail-read", "send", "--to", "a@b.com", "-b", "x", "--body-stdin"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_numeric_count_rejected() {
        let err = Cli::try_parse_from(["gmail-read", "-n", "many"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);
    }

    #[test]
    fn test_help_and_version_exit_zero() {
        let err = Cli::try_parse_from(["gmail-read", "--help"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 0);
        let err = Cli::try_parse_from(["gmail-read", "--version"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 0);
        let err = Cli::try_parse_from(["gmail-read", "--bogus"]).unwrap_err();
        assert_eq!(parse_exit_code(&err), 1);
    }
}
