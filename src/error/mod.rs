//! Error types for the batch progress engine.

use thiserror::Error;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Main error type for the batch progress engine.
///
/// None of these ever reach the host page. Per-message failures are logged
/// and counted by the dispatcher; view-level failures stop that view only.
#[derive(Error, Debug)]
pub enum ProgressError {
    /// Inbound message could not be parsed or had the wrong shape.
    #[error("Malformed message ({reason}): {raw}")]
    MalformedMessage {
        /// What was wrong with the payload.
        reason: String,
        /// The raw payload as received.
        raw: String,
    },

    /// The navigation location carries no batch identifier.
    #[error("No batch ID found in path: {path}")]
    MissingBatchId {
        /// Path that was searched.
        path: String,
    },

    /// Neither an override host nor the page host is available.
    #[error("Could not determine WebSocket host")]
    MissingHost,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Streaming connection failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A wait was cancelled by teardown.
    #[error("Cancelled")]
    Cancelled,
}

impl ProgressError {
    /// Build a malformed-message error, keeping the raw payload for diagnostics.
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        ProgressError::MalformedMessage {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

impl From<toml::de::Error> for ProgressError {
    fn from(err: toml::de::Error) -> Self {
        ProgressError::Config(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ProgressError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ProgressError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite;

    #[test]
    fn test_transport_error_conversion() {
        let err = ProgressError::from(tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, ProgressError::Transport(_)));
        assert!(err.to_string().starts_with("Transport error: "));
    }

    #[test]
    fn test_malformed_keeps_raw_payload() {
        let err = ProgressError::malformed("expected a JSON object", "[1]");
        assert_eq!(err.to_string(), "Malformed message (expected a JSON object): [1]");
    }
}
