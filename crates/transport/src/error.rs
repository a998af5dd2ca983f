//! Transport error types

/// Failures to complete an exchange with the remote service.
///
/// HTTP error statuses are not errors at this layer; they arrive as a
/// `Response` and are classified by the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
