//! Security-event telemetry emitted by the decision engine.
//!
//! The crate only calls the sink; storage and delivery belong to the
//! embedding application. A tracing-backed sink ships as the default so
//! degradation and abuse remain visible without any wiring.

use async_trait::async_trait;
use http::HeaderMap;
use tracing::warn;

/// The event kinds the rate limiter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventType {
    /// A caller exhausted a bucket's quota
    RateLimitExceeded,
    /// The shared store could not arbitrate a check
    RateLimitUnavailable,
}

impl SecurityEventType {
    /// Get the event name for sinks and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::RateLimitExceeded => "rate_limit_exceeded",
            SecurityEventType::RateLimitUnavailable => "rate_limit_unavailable",
        }
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded security event.
///
/// The metadata carries the bucket, route, ip hash, retry-after, limit
/// and window. It never carries the raw client address.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    /// What happened
    pub event_type: SecurityEventType,
    /// The authenticated user involved, if any
    pub user_id: Option<String>,
    /// Headers of the triggering request
    pub headers: HeaderMap,
    /// Structured event details
    pub metadata: serde_json::Value,
}

/// Trait for security-event recorders.
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    /// Record one event.
    async fn record(&self, event: SecurityEvent);
}

/// Default sink that reports events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingEventSink;

#[async_trait]
impl SecurityEventSink for TracingEventSink {
    async fn record(&self, event: SecurityEvent) {
        warn!(
            event_type = %event.event_type,
            user_id = event.user_id.as_deref().unwrap_or("anon"),
            metadata = %event.metadata,
            "Security event recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(
            SecurityEventType::RateLimitExceeded.as_str(),
            "rate_limit_exceeded"
        );
        assert_eq!(
            SecurityEventType::RateLimitUnavailable.as_str(),
            "rate_limit_unavailable"
        );
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingEventSink;
        sink.record(SecurityEvent {
            event_type: SecurityEventType::RateLimitExceeded,
            user_id: None,
            headers: HeaderMap::new(),
            metadata: serde_json::json!({"bucket": "auth"}),
        })
        .await;
    }
}
