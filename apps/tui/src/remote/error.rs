use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("sign-in was not completed: {0}")]
    Callback(String),
    #[error("timed out waiting for the browser sign-in")]
    CallbackTimeout,
    #[error("not signed in")]
    NotSignedIn,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid session data: {0}")]
    Session(#[from] serde_json::Error),
}

/// Error bodies of PostgREST (`message`) and GoTrue (`error_description`,
/// `msg`, `error`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

/// Human-readable message for a failed response.
pub fn error_message(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error_description)
        .or(parsed.msg)
        .or(parsed.error)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.chars().take(200).collect()
            }
        })
}

pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status.as_u16(), &body);
    tracing::warn!(status = status.as_u16(), %message, "remote request failed");
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgrest_message_is_surfaced() {
        let body = r#"{"code":"42703","details":null,"hint":null,"message":"column enriched_pois.town does not exist"}"#;
        assert_eq!(
            error_message(400, body),
            "column enriched_pois.town does not exist"
        );
    }

    #[test]
    fn test_gotrue_and_plain_bodies() {
        assert_eq!(
            error_message(400, r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token"}"#),
            "Invalid Refresh Token"
        );
        assert_eq!(error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(503, "  "), "HTTP 503");
    }
}
