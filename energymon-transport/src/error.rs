//! Error types for request delivery.

use thiserror::Error;

/// Result type alias using [`TransportError`].
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by a [`Transport`](crate::Transport) or a
/// [`Connector`](crate::Connector).
#[derive(Error, Debug)]
pub enum TransportError {
    /// `initialize` has not been called.
    #[error("HTTP client not initialized")]
    NotInitialized,

    /// The base URL or a request URL is malformed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The underlying client could not be constructed.
    #[error("Failed to initialize HTTP client: {0}")]
    Client(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The collector could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The collector answered with a non-success status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The response body was not a JSON document.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure injected through `simulate_failure`.
    #[error("Simulated HTTP failure")]
    Simulated,
}

impl TransportError {
    /// Whether another attempt could succeed.
    ///
    /// Anything the collector or the network did wrong is retried: timeouts,
    /// connection failures, any non-success status and unparseable bodies.
    /// Local failures (setup, URL, payload, injected) are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_)
                | TransportError::Connection(_)
                | TransportError::Status { .. }
                | TransportError::Decode(_)
        )
    }
}
