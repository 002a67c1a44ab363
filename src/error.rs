//! Error types for the users-core library.

use thiserror::Error;

/// Main error type for users-core operations.
#[derive(Error, Debug)]
pub enum UsersCoreError {
    /// Configuration and argument validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reservation was rejected because the window is saturated or the
    /// key is hard-blocked. `reset` is the epoch-ms instant at which the
    /// window frees up, or [`STATUS_FOREVER`](crate::ratelimit::STATUS_FOREVER)
    /// when the block has no expiry.
    #[error("Rate limit exceeded: limit {limit}, reset at {reset}")]
    RateLimit {
        /// Epoch-ms instant at which the key becomes available again, 0 = never
        reset: u64,
        /// The configured window limit
        limit: u32,
    },

    /// A search filter expression carried an operation the compiler does
    /// not recognize. Carries the raw offending value.
    #[error("Not supported operation: {0}")]
    UnsupportedOperation(serde_json::Value),

    /// Redis store errors
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UsersCoreError {
    /// Whether this error is a rate-limit rejection, i.e. an expected
    /// control-flow branch rather than a defect. Callers surface these as
    /// throttling responses with a retry hint instead of server errors.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UsersCoreError::RateLimit { .. })
    }
}

/// Result type alias for users-core operations.
pub type Result<T> = std::result::Result<T, UsersCoreError>;
