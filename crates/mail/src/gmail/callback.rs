//! Loopback consent flow
//!
//! Opens the provider consent page in a browser and waits, with a timeout,
//! for the redirect carrying the authorization code on a local listener.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use super::oauth::{AuthorizationCode, ConsentFlow};
use crate::config::ClientSecret;
use crate::error::MailError;

/// Query parameters of the OAuth redirect
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse the request line of the redirect, e.g. `GET /?code=X&state=Y HTTP/1.1`
    pub fn from_request_line(line: &str) -> Option<Self> {
        let target = line.split_whitespace().nth(1)?;
        let url = url::Url::parse(&format!("http://localhost{target}")).ok()?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(params)
    }

    /// Whether this request is the OAuth redirect (and not e.g. a favicon request)
    pub fn is_redirect(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Consent flow using a browser and a listener on 127.0.0.1
#[derive(Debug, Clone)]
pub struct LoopbackConsent {
    timeout: Duration,
    open_browser: bool,
}

impl Default for LoopbackConsent {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl LoopbackConsent {
    /// How long to wait for the user to finish consent
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            open_browser: true,
        }
    }

    /// Only print the consent URL instead of launching a browser
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Build the provider consent URL
    pub fn consent_url(
        secret: &ClientSecret,
        scopes: &BTreeSet<String>,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String> {
        let scope = scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        let url = url::Url::parse_with_params(
            &secret.auth_uri,
            [
                ("client_id", secret.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .with_context(|| format!("Invalid auth_uri in credentials: {}", secret.auth_uri))?;
        Ok(url.into())
    }

    /// Wait for the redirect on `listener` and return its authorization code
    pub fn wait_for_code(&self, listener: &TcpListener, expected_state: &str) -> Result<String> {
        listener
            .set_nonblocking(true)
            .context("Failed to configure callback listener")?;
        let deadline = Instant::now() + self.timeout;

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("Callback connection from {}", peer);
                    match handle_connection(stream) {
                        Ok(Some(params)) => return Self::code_from(params, expected_state),
                        Ok(None) => {}
                        Err(e) => debug!("Ignoring unreadable callback connection: {:#}", e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(MailError::Authentication(format!(
                            "timed out after {}s awaiting consent",
                            self.timeout.as_secs()
                        ))
                        .into());
                    }
                    std::thread::sleep(Self::POLL_INTERVAL);
                }
                Err(e) => return Err(e).context("Failed to accept callback connection"),
            }
        }
    }

    fn code_from(params: CallbackParams, expected_state: &str) -> Result<String> {
        if let Some(err) = params.error {
            return Err(MailError::Authentication(format!("consent denied: {err}")).into());
        }
        if params.state.as_deref() != Some(expected_state) {
            return Err(MailError::Authentication("consent callback state mismatch".into()).into());
        }
        params
            .code
            .ok_or_else(|| MailError::Authentication("no authorization code received".into()).into())
    }
}

impl ConsentFlow for LoopbackConsent {
    fn request_code(&self, secret: &ClientSecret, scopes: &BTreeSet<String>) -> Result<AuthorizationCode> {
        let listener =
            TcpListener::bind("127.0.0.1:0").context("Failed to start local callback listener")?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}/");
        let state = random_state();
        let auth_url = Self::consent_url(secret, scopes, &redirect_uri, &state)?;

        eprintln!("\n=== Gmail Authorization Required ===");
        eprintln!("Visit this URL to authorize gmail-read:\n\n{auth_url}\n");
        if self.open_browser
            && let Err(e) = open::that(&auth_url)
        {
            eprintln!("Failed to open browser: {e}. Please open the URL manually.");
        }
        eprintln!("Waiting up to {}s for authorization...", self.timeout.as_secs());

        let code = self.wait_for_code(&listener, &state)?;
        info!("Received authorization code on port {}", port);
        Ok(AuthorizationCode { code, redirect_uri })
    }
}

/// Read one request, answer it, and return its parameters if it is the redirect
fn handle_connection(mut stream: TcpStream) -> Result<Option<CallbackParams>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read callback request")?;

    let params = CallbackParams::from_request_line(&request_line).filter(CallbackParams::is_redirect);

    let (status, body) = match &params {
        Some(p) if p.code.is_some() => ("200 OK", "Authentication successful! You can close this window."),
        Some(_) => ("400 Bad Request", "Authentication failed. Please try again."),
        None => ("404 Not Found", "Not found."),
    };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{body}</h1></body></html>"
    );
    stream.write_all(response.as_bytes()).ok();

    Ok(params)
}

/// Unpredictable `state` value for CSRF protection
fn random_state() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    (0..2)
        .map(|_| format!("{:016x}", RandomState::new().build_hasher().finish()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn secret() -> ClientSecret {
        ClientSecret::from_json(r#"{"client_id": "cid", "client_secret": "cs"}"#).unwrap()
    }

    #[test]
    fn test_parse_callback_with_code() {
        let params =
            CallbackParams::from_request_line("GET /?code=4%2F0Abc&state=xyz&scope=a HTTP/1.1\r\n")
                .unwrap();
        assert_eq!(params.code.as_deref(), Some("4/0Abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.is_redirect());
    }

    #[test]
    fn test_parse_callback_with_error() {
        let params =
            CallbackParams::from_request_line("GET /?error=access_denied&state=s HTTP/1.1").unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.code, None);
    }

    #[test]
    fn test_favicon_is_not_redirect() {
        let params = CallbackParams::from_request_line("GET /favicon.ico HTTP/1.1").unwrap();
        assert!(!params.is_redirect());
        assert!(CallbackParams::from_request_line("").is_none());
    }

    #[test]
    fn test_consent_url_contains_parameters() {
        let scopes: BTreeSet<String> = ["https://www.googleapis.com/auth/gmail.readonly".to_string()].into();
        let url = LoopbackConsent::consent_url(&secret(), &scopes, "http://localhost:1234/", "st").unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("redirect_uri".into(), "http://localhost:1234/".into())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("state".into(), "st".into())));
        assert!(pairs.contains(&(
            "scope".into(),
            "https://www.googleapis.com/auth/gmail.readonly".into()
        )));
    }

    #[test]
    fn test_random_state_is_unique() {
        let a = random_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, random_state());
    }

    #[test]
    fn test_wait_for_code_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let consent = LoopbackConsent::new(Duration::from_millis(200)).without_browser();
        let err = consent.wait_for_code(&listener, "state").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MailError>(),
            Some(MailError::Authentication(_))
        ));
        assert!(err.to_string().contains("timed out"));
    }

    fn send_request(port: u16, line: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(line.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_wait_for_code_receives_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = std::thread::spawn(move || {
            let favicon = send_request(port, "GET /favicon.ico HTTP/1.1\r\n\r\n");
            let redirect = send_request(port, "GET /?code=abc123&state=good HTTP/1.1\r\n\r\n");
            (favicon, redirect)
        });

        let consent = LoopbackConsent::new(Duration::from_secs(10)).without_browser();
        let code = consent.wait_for_code(&listener, "good").unwrap();
        let (favicon, redirect) = client.join().unwrap();

        assert_eq!(code, "abc123");
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(redirect.starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn test_state_mismatch_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client =
            std::thread::spawn(move || send_request(port, "GET /?code=abc&state=evil HTTP/1.1\r\n\r\n"));

        let consent = LoopbackConsent::new(Duration::from_secs(10)).without_browser();
        let err = consent.wait_for_code(&listener, "good").unwrap_err();
        client.join().unwrap();
        assert!(err.to_string().contains("state mismatch"));
    }
}
