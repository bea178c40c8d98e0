//! Error types for the advisory gateway.

use thiserror::Error;

/// Errors produced by the AI advisory gateway and its backends.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request was rejected before reaching the backend.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The backend answered, but the payload could not be understood.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// A speech request produced no audio.
    #[error("no audio media was generated")]
    MissingAudio,

    /// Audio could not be converted into a playable container.
    #[error("audio encoding failed: {0}")]
    Encoding(String),

    /// The backend is not configured (for example, no API key).
    #[error("backend not configured: {0}")]
    NotConfigured(String),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a malformed output error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedOutput(message.into())
    }

    /// Whether the failure happened before any network round trip.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::NotConfigured(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = GatewayError::Status {
            status: 429,
            body: "quota".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned HTTP 429: quota");
    }

    #[test]
    fn test_missing_audio_display() {
        assert_eq!(
            GatewayError::MissingAudio.to_string(),
            "no audio media was generated"
        );
    }

    #[test]
    fn test_is_local() {
        assert!(GatewayError::invalid_request("empty").is_local());
        assert!(GatewayError::NotConfigured("no key".to_string()).is_local());
        assert!(!GatewayError::malformed("bad json").is_local());
        assert!(!GatewayError::Network("refused".to_string()).is_local());
    }
}
