//! Error types for credential operations

/// Errors from credential storage and auth wire parsing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
