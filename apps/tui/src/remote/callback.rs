//! Loopback HTTP listener that receives the OAuth redirect.

use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::RemoteError;

pub const CALLBACK_PATH: &str = "/callback";
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

const SIGNED_IN_PAGE: &str = "<html><body><h3>Signed in to POI Tracker.</h3>\
<p>You can close this window and return to the terminal.</p></body></html>";
const FAILED_PAGE: &str = "<html><body><h3>Sign-in failed.</h3>\
<p>Return to the terminal for details.</p></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Denied(String),
    /// A callback that does not carry this sign-in's `state`.
    StateMismatch,
    /// Not the redirect (favicon, stray requests); keep waiting.
    Ignored,
}

/// Classify an HTTP request line such as
/// `GET /callback?state=s&code=abc HTTP/1.1`.
pub fn parse_request_line(line: &str, expected_state: &str) -> CallbackOutcome {
    let mut parts = line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return CallbackOutcome::Ignored;
    };
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return CallbackOutcome::Ignored;
    };
    if url.path() != CALLBACK_PATH {
        return CallbackOutcome::Ignored;
    }

    let mut code = None;
    let mut error = None;
    let mut description = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return CallbackOutcome::StateMismatch;
    }

    match (code, description.or(error)) {
        (Some(code), _) if !code.is_empty() => CallbackOutcome::Code(code),
        (_, Some(reason)) => CallbackOutcome::Denied(reason),
        _ => CallbackOutcome::Denied("redirect carried no authorization code".to_string()),
    }
}

pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
    state: String,
}

impl CallbackListener {
    /// `state` is an alphanumeric token echoed back in the redirect URL.
    pub async fn bind(port: u16, state: String) -> Result<Self, RemoteError> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let port = listener.local_addr()?.port();
        tracing::debug!(port, "sign-in callback listener bound");
        Ok(Self {
            listener,
            port,
            state,
        })
    }

    pub fn redirect_url(&self) -> String {
        format!(
            "http://127.0.0.1:{}{CALLBACK_PATH}?state={}",
            self.port, self.state
        )
    }

    /// Serve requests until the redirect arrives. A broken connection only
    /// costs that connection; callers bound the wait.
    pub async fn wait_for_code(self) -> Result<String, RemoteError> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "callback accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            tracing::debug!(%peer, "callback connection");
            match handle_connection(stream, &self.state).await {
                Ok(CallbackOutcome::Code(code)) => return Ok(code),
                Ok(CallbackOutcome::Denied(reason)) => return Err(RemoteError::Callback(reason)),
                Ok(CallbackOutcome::StateMismatch) => {
                    tracing::warn!(%peer, "rejected callback with unknown state");
                }
                Ok(CallbackOutcome::Ignored) => {}
                Err(e) => tracing::warn!(%peer, error = %e, "bad callback connection"),
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    expected_state: &str,
) -> Result<CallbackOutcome, RemoteError> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers so the browser sees a clean response.
    let mut header = String::new();
    while reader.read_line(&mut header).await? > 2 {
        header.clear();
    }

    let outcome = parse_request_line(&request_line, expected_state);
    let (status, page) = match outcome {
        CallbackOutcome::Code(_) => ("200 OK", SIGNED_IN_PAGE),
        CallbackOutcome::Denied(_) | CallbackOutcome::StateMismatch => {
            ("400 Bad Request", FAILED_PAGE)
        }
        CallbackOutcome::Ignored => ("404 Not Found", ""),
    };
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    );

    let mut stream = reader.into_inner();
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(error = %e, "browser closed the callback connection early");
    }
    stream.shutdown().await.ok();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = "s7Kq";

    #[test]
    fn test_code_is_extracted() {
        assert_eq!(
            parse_request_line("GET /callback?state=s7Kq&code=abc%2F123 HTTP/1.1\r\n", STATE),
            CallbackOutcome::Code("abc/123".to_string())
        );
    }

    #[test]
    fn test_provider_error_is_reported() {
        assert_eq!(
            parse_request_line(
                "GET /callback?state=s7Kq&error=access_denied&error_description=User+cancelled HTTP/1.1",
                STATE
            ),
            CallbackOutcome::Denied("User cancelled".to_string())
        );
        assert!(matches!(
            parse_request_line("GET /callback?state=s7Kq HTTP/1.1", STATE),
            CallbackOutcome::Denied(_)
        ));
    }

    #[test]
    fn test_foreign_state_is_rejected() {
        assert_eq!(
            parse_request_line("GET /callback?state=other&code=abc HTTP/1.1", STATE),
            CallbackOutcome::StateMismatch
        );
        assert_eq!(
            parse_request_line("GET /callback?code=abc HTTP/1.1", STATE),
            CallbackOutcome::StateMismatch
        );
    }

    #[test]
    fn test_unrelated_requests_are_ignored() {
        assert_eq!(
            parse_request_line("GET /favicon.ico HTTP/1.1", STATE),
            CallbackOutcome::Ignored
        );
        assert_eq!(
            parse_request_line("POST /callback?state=s7Kq HTTP/1.1", STATE),
            CallbackOutcome::Ignored
        );
        assert_eq!(parse_request_line("", STATE), CallbackOutcome::Ignored);
    }

    fn port_of(listener: &CallbackListener) -> u16 {
        listener.port
    }

    #[tokio::test]
    async fn test_listener_survives_bad_connections() -> Result<(), Box<dyn std::error::Error>> {
        let listener = CallbackListener::bind(0, STATE.to_string()).await?;
        assert!(listener.redirect_url().ends_with("/callback?state=s7Kq"));
        let port = port_of(&listener);

        let waiter = tokio::spawn(listener.wait_for_code());

        // A request line that is not UTF-8 fails while reading.
        let mut garbage = TcpStream::connect(("127.0.0.1", port)).await?;
        garbage.write_all(&[0xff, 0xfe, 0xfd, b'\n']).await?;
        drop(garbage);

        let mut forged = TcpStream::connect(("127.0.0.1", port)).await?;
        forged
            .write_all(b"GET /callback?state=guess&code=evil HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await?;
        drop(forged);

        let mut favicon = TcpStream::connect(("127.0.0.1", port)).await?;
        favicon
            .write_all(b"GET /favicon.ico HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await?;
        drop(favicon);

        let mut browser = TcpStream::connect(("127.0.0.1", port)).await?;
        browser
            .write_all(b"GET /callback?state=s7Kq&code=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await?;

        assert_eq!(waiter.await??, "xyz");
        Ok(())
    }
}
