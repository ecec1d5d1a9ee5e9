/// Errors from key store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Keys must be at least one byte long.
    #[error("key name must not be empty")]
    EmptyKey,

    /// The value exceeds the configured size limit.
    #[error("value of {size} bytes exceeds limit of {max}")]
    ValueTooLarge { size: usize, max: usize },

    /// A zero duration was given where a deadline is required.
    #[error("expiry must be greater than zero")]
    InvalidExpiry,

    /// The deadline lies beyond what the clock can represent.
    #[error("invalid expire time")]
    ExpiryOutOfRange,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
