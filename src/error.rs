//! Error types for the Floodgate rate limiter.

use thiserror::Error;

use crate::ratelimit::RateLimitBucket;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared counter store errors
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;

/// The typed rejection raised by `enforce_rate_limit`.
///
/// This is an expected outcome, not a bug: callers render it as an
/// HTTP 429 with a `Retry-After` hint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rate limit exceeded for bucket {bucket}, retry after {retry_after_ms}ms")]
pub struct RateLimitedError {
    /// The abuse category that was exhausted.
    pub bucket: RateLimitBucket,
    /// How long the caller should wait before retrying, in milliseconds.
    pub retry_after_ms: u64,
}

impl RateLimitedError {
    /// The `Retry-After` value in whole seconds, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }

    /// The HTTP status for a rejected request.
    pub fn status(&self) -> http::StatusCode {
        http::StatusCode::TOO_MANY_REQUESTS
    }

    /// Set status 429 and the `Retry-After` header on an outgoing response.
    ///
    /// Best-effort: callers invoke this only when a response exists
    /// (background jobs have none and simply propagate the error).
    pub fn apply<B>(&self, response: &mut http::Response<B>) {
        *response.status_mut() = self.status();
        if let Ok(value) = http::HeaderValue::from_str(&self.retry_after_secs().to_string()) {
            response.headers_mut().insert(http::header::RETRY_AFTER, value);
        }
    }
}
