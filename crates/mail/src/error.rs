//! Error taxonomy surfaced to the command layer
//!
//! Library functions return `anyhow::Result`; failures the caller must tell
//! apart are raised as [`MailError`] and recovered with
//! `err.downcast_ref::<MailError>()`.

/// Typed failures for gmail-read operations
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Missing or malformed client-secret file
    #[error("{0}")]
    Configuration(String),

    /// Consent or refresh failed, timed out, or the token was rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The addressed message does not exist
    #[error("message not found: {0}")]
    NotFound(String),

    /// Granted scopes do not cover the request
    #[error("permission denied: {0}")]
    Permission(String),

    /// Provider throttling; never retried
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Network-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other non-success response from the provider
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

impl MailError {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Api { .. } => 1,
            Self::Authentication(_) => 2,
            Self::NotFound(_) => 3,
            Self::Permission(_) => 4,
            Self::QuotaExceeded(_) => 5,
            Self::Transport(_) => 6,
            Self::Configuration(_) => 7,
        }
    }

    /// Whether the failure happened below HTTP (connect, DNS, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Exit code for any error, falling back to 1 for untyped failures
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<MailError>())
        .map_or(1, MailError::exit_code)
}

/// Whether any error in the chain is a transport failure
pub fn is_transport_error(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<MailError>())
        .is_some_and(MailError::is_transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            MailError::Configuration(String::new()),
            MailError::Authentication(String::new()),
            MailError::NotFound(String::new()),
            MailError::Permission(String::new()),
            MailError::QuotaExceeded(String::new()),
            MailError::Transport(String::new()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(MailError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_exit_code_through_context() {
        let err: anyhow::Error = MailError::NotFound("missing123".into()).into();
        let err = Err::<(), _>(err).context("Failed to read message").unwrap_err();
        assert_eq!(exit_code_for(&err), 3);
    }

    #[test]
    fn test_untyped_error_is_generic() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), 1);
        assert!(!is_transport_error(&err));
    }

    #[test]
    fn test_transport_detection() {
        let err: anyhow::Error = MailError::Transport("connection refused".into()).into();
        assert!(is_transport_error(&err));
    }
}
