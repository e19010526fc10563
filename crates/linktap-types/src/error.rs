//! Structured error model for tap operations.
//!
//! [`TapError`] classifies failures the way the sync engine needs to react
//! to them: transport/API errors abort the current traversal, sink errors
//! abort the run, and config errors abort before any request is made.

use serde_json::Value;
use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TapError>;

/// Broad classification of a tap failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Invalid tap configuration.
    Config,
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded (retryable).
    RateLimit,
    /// Upstream API rejected the request or failed.
    Api,
    /// Network-level failure reaching the API (retryable).
    Transport,
    /// Response body was not the expected shape.
    Decode,
    /// Record sink I/O failure (fatal to the run).
    Sink,
    /// Bookmark persistence failure (fatal to the run).
    State,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Api => "api",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Sink => "sink",
            Self::State => "state",
        };
        f.write_str(s)
    }
}

/// Error from a tap operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TapError {
    /// Invalid tap configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The API returned a non-2xx status.
    #[error("HTTP-error-code: {status}, Error: {message}")]
    Api { status: u16, message: String },

    /// Network-level failure reaching the API.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Record or schema emission failed.
    #[error("sink error for stream {stream}: {message}")]
    Sink { stream: String, message: String },

    /// Bookmark persistence failed.
    #[error("state error: {0}")]
    State(String),
}

/// Operator-facing descriptions for statuses whose bodies carry none.
fn default_status_message(status: u16) -> &'static str {
    match status {
        400 => "The request is missing or has a bad parameter.",
        401 => "Invalid authorization credentials.",
        403 => "User does not have permission to access the resource.",
        404 => {
            "The resource you have specified cannot be found. Either the accounts \
             provided are invalid or you do not have access to the Ad Account."
        }
        405 => "The provided HTTP method is not supported by the URL.",
        411 => "The server refuses to accept the request without a defined Content-Length header.",
        429 => "API rate limit exceeded, please retry after some time.",
        500 => "An error has occurred at LinkedIn's end.",
        504 => "A gateway timeout occurred. There is a problem at LinkedIn's end.",
        _ => "Unknown Error",
    }
}

impl TapError {
    /// Build an API error from a status code and (possibly absent) error body.
    ///
    /// The message comes from the body's `errorDetails` or `message` field
    /// when present, except for 404 whose upstream body is a bare
    /// "Not Found" and gets the canned description instead.
    #[must_use]
    pub fn from_status(status: u16, body: Option<&Value>) -> Self {
        let message = if status == 404 {
            default_status_message(status).to_string()
        } else {
            body.and_then(|b| {
                b.get("errorDetails")
                    .or_else(|| b.get("message"))
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .unwrap_or_else(|| default_status_message(status).to_string())
        };
        Self::Api { status, message }
    }

    /// Classify this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                429 => ErrorCategory::RateLimit,
                _ => ErrorCategory::Api,
            },
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::Sink { .. } => ErrorCategory::Sink,
            Self::State(_) => ErrorCategory::State,
        }
    }

    /// Whether the HTTP client may retry the failed request.
    ///
    /// Retries live entirely at the client boundary; the engine never
    /// consults this.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_prefers_error_details_from_body() {
        let body = json!({"errorDetails": "bad pivot", "message": "ignored"});
        let err = TapError::from_status(400, Some(&body));
        assert_eq!(
            err.to_string(),
            "HTTP-error-code: 400, Error: bad pivot"
        );
    }

    #[test]
    fn message_falls_back_to_body_message_then_canned_text() {
        let body = json!({"message": "from body"});
        let err = TapError::from_status(400, Some(&body));
        assert!(err.to_string().contains("from body"));

        let err = TapError::from_status(405, None);
        assert!(err.to_string().contains("not supported by the URL"));
    }

    #[test]
    fn not_found_always_uses_canned_message() {
        let body = json!({"message": "Not Found"});
        let err = TapError::from_status(404, Some(&body));
        assert!(err.to_string().contains("cannot be found"));
    }

    #[test]
    fn retryable_statuses() {
        assert!(TapError::from_status(429, None).is_retryable());
        assert!(TapError::from_status(500, None).is_retryable());
        assert!(TapError::from_status(504, None).is_retryable());
        assert!(!TapError::from_status(400, None).is_retryable());
        assert!(!TapError::from_status(401, None).is_retryable());
        assert!(TapError::Transport("connection reset".into()).is_retryable());
    }

    #[test]
    fn categories() {
        assert_eq!(TapError::from_status(401, None).category(), ErrorCategory::Auth);
        assert_eq!(
            TapError::from_status(429, None).category(),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            TapError::Sink { stream: "accounts".into(), message: "broken pipe".into() }.category(),
            ErrorCategory::Sink
        );
    }
}
