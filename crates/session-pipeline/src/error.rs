//! Error types for the session pipeline

/// Message delivered to every caller whose session could not be recovered.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// Errors surfaced to callers of `SessionClient`.
///
/// Authorization recovery happens inside the pipeline; only its terminal
/// outcomes appear here. Non-authorization failures pass through unchanged
/// (`Transport`), and non-401 statuses are not errors at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Refresh was unavailable or failed. The session has been terminated.
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// The request failed authorization again after a successful refresh.
    #[error("{path} rejected the refreshed credential ({status})")]
    RetryExhausted { path: String, status: u16 },

    /// An auth endpoint (login/refresh) answered 401.
    #[error("{path} rejected the request ({status})")]
    Unauthorized { path: String, status: u16 },

    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("login failed ({status}): {message}")]
    LoginFailed { status: u16, message: String },

    #[error("registration failed ({status}): {message}")]
    RegistrationFailed { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    #[error("credential error: {0}")]
    Credentials(#[from] session_auth::Error),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
