use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("key name must not be empty")]
    EmptyKey,
}
