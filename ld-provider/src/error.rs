//! Error types for the LaunchDarkly client.

use ld_provider_retries::ExecError;
use thiserror::Error;

/// The main error type for client operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid or missing provider configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request could not be sent or the response could not be read.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("{} {}: {}", .status, reason(*.status), .body)]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// A path could not be joined onto the API host.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raised by the execution layer: cancellation, exhausted retries, a closed gate.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

fn reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
}

impl ProviderError {
    /// Create an API error.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Get the HTTP status behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Exec(err) => err.status(),
            _ => None,
        }
    }

    /// Check if the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if the call was cancelled at a suspension point.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Exec(err) if err.is_cancelled())
    }
}

/// Result type alias using ProviderError.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ld_provider_retries::Suspension;

    #[test]
    fn test_api_error_display_includes_body() {
        let err = ProviderError::api(409, r#"{"code":"conflict"}"#);
        assert_eq!(err.to_string(), r#"409 Conflict: {"code":"conflict"}"#);
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_not_found() {
        assert!(ProviderError::api(404, "").is_not_found());
        assert!(!ProviderError::api(400, "").is_not_found());
        assert!(!ProviderError::Configuration("x".into()).is_not_found());
    }

    #[test]
    fn test_cancelled_is_distinct_from_exhausted() {
        let cancelled = ProviderError::from(ExecError::Cancelled(Suspension::BackingOff));
        let exhausted = ProviderError::from(ExecError::Exhausted {
            policy: "rate-limit",
            attempts: 21,
            status: 429,
        });
        assert!(cancelled.is_cancelled());
        assert!(!exhausted.is_cancelled());
        assert_eq!(exhausted.status(), Some(429));
    }
}
