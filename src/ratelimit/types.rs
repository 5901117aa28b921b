//! Request and decision types for rate limit checks.

use http::HeaderMap;

use super::bucket::RateLimitBucket;

/// One rate limit check, built fresh per call.
#[derive(Debug, Clone)]
pub struct RateLimitRequest<'a> {
    /// The abuse category to count against
    pub bucket: RateLimitBucket,
    /// Route identifier, normalized during key derivation
    pub route: &'a str,
    /// Inbound request headers, used for proxy address resolution
    pub headers: &'a HeaderMap,
    /// Authenticated user id, if any
    pub user_id: Option<&'a str>,
    /// Explicit client address, overriding header resolution
    pub ip_address: Option<&'a str>,
}

impl<'a> RateLimitRequest<'a> {
    /// Create a request for an anonymous caller.
    pub fn new(bucket: RateLimitBucket, route: &'a str, headers: &'a HeaderMap) -> Self {
        Self {
            bucket,
            route,
            headers,
            user_id: None,
            ip_address: None,
        }
    }

    /// Attach the authenticated user id.
    pub fn with_user(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Supply the client address explicitly instead of reading headers.
    pub fn with_ip(mut self, ip_address: &'a str) -> Self {
        self.ip_address = Some(ip_address);
        self
    }
}

/// The outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// How long to wait before retrying, in milliseconds (0 when allowed)
    pub retry_after_ms: u64,
    /// Events left in the current window
    pub remaining: u32,
    /// Maximum events permitted in the window
    pub limit: u32,
    /// Window duration in milliseconds
    pub window_ms: u64,
    /// The derived counting key
    pub key: String,
    /// One-way hash of the resolved client address
    pub ip_hash: String,
}

impl RateLimitDecision {
    /// Create an allowed decision.
    pub fn allowed(remaining: u32, limit: u32, window_ms: u64, key: String, ip_hash: String) -> Self {
        Self {
            allowed: true,
            retry_after_ms: 0,
            remaining,
            limit,
            window_ms,
            key,
            ip_hash,
        }
    }

    /// Create a blocked decision.
    pub fn blocked(
        retry_after_ms: u64,
        limit: u32,
        window_ms: u64,
        key: String,
        ip_hash: String,
    ) -> Self {
        Self {
            allowed: false,
            retry_after_ms,
            remaining: 0,
            limit,
            window_ms,
            key,
            ip_hash,
        }
    }
}

/// Current unix time in milliseconds.
pub fn current_time_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let headers = HeaderMap::new();
        let request = RateLimitRequest::new(RateLimitBucket::Export, "/export/report", &headers)
            .with_user("u-42")
            .with_ip("203.0.113.9");

        assert_eq!(request.bucket, RateLimitBucket::Export);
        assert_eq!(request.user_id, Some("u-42"));
        assert_eq!(request.ip_address, Some("203.0.113.9"));
    }

    #[test]
    fn test_allowed_decision_has_zero_retry() {
        let decision =
            RateLimitDecision::allowed(4, 5, 1000, "k".to_string(), "h".to_string());
        assert!(decision.allowed);
        assert_eq!(decision.retry_after_ms, 0);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn test_blocked_decision_has_zero_remaining() {
        let decision =
            RateLimitDecision::blocked(750, 5, 1000, "k".to_string(), "h".to_string());
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after_ms, 750);
    }
}
