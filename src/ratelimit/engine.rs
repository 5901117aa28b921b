//! The rate limit decision engine and degradation policy.
//!
//! Orchestrates address resolution, key derivation and counting into one
//! `check_rate_limit` / `enforce_rate_limit` contract. Store availability
//! is judged fresh on every call: a reachable store arbitrates, an
//! unreachable optional store degrades to local counting, and an
//! unreachable required store fails closed.

use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bucket::{BucketPolicy, PolicyTable};
use super::counter::{Acquisition, WindowCounter};
use super::ip::{hash_ip, resolve_client_ip};
use super::key::derive_key;
use super::local::LocalWindowCounter;
use super::store::RedisWindowStore;
use super::types::{current_time_millis, RateLimitDecision, RateLimitRequest};
use crate::config::{FloodgateConfig, StorePolicy};
use crate::error::{RateLimitedError, Result};
use crate::telemetry::{SecurityEvent, SecurityEventSink, SecurityEventType, TracingEventSink};

/// The rate limiter shared by every caller in the process.
///
/// Construct once at startup and pass by reference; per-call state lives
/// entirely in the counters.
pub struct RateLimiter {
    /// Static bucket policies
    policies: PolicyTable,
    /// Durable shared-store counter, when configured and reachable at startup
    store: Option<Arc<dyn WindowCounter>>,
    /// Whether decisions may degrade to local counting
    store_policy: StorePolicy,
    /// In-process fallback counter
    local: LocalWindowCounter,
    /// Security-event recorder
    events: Arc<dyn SecurityEventSink>,
}

impl RateLimiter {
    /// Create a rate limiter from deployment configuration.
    ///
    /// A configured store that is unreachable at startup is logged and
    /// left unset; every subsequent call then takes the degradation path
    /// its policy dictates, and reconnection is a redeploy/restart
    /// concern rather than hidden retry state.
    pub async fn new(config: &FloodgateConfig, events: Arc<dyn SecurityEventSink>) -> Result<Self> {
        let policies = config.policy_table()?;

        let store: Option<Arc<dyn WindowCounter>> = match config.store.url.as_deref() {
            Some(url) => match RedisWindowStore::connect(url).await {
                Ok(store) => {
                    info!("Rate limiter using shared counter store");
                    Some(Arc::new(store))
                }
                Err(e) => {
                    warn!(error = %e, "Shared counter store unreachable at startup");
                    None
                }
            },
            None => None,
        };

        Ok(Self::with_parts(policies, store, config.store.policy, events))
    }

    /// Create a rate limiter with the tracing-backed default sink.
    pub async fn with_defaults(config: &FloodgateConfig) -> Result<Self> {
        Self::new(config, Arc::new(TracingEventSink)).await
    }

    /// Assemble a rate limiter from explicit parts.
    pub fn with_parts(
        policies: PolicyTable,
        store: Option<Arc<dyn WindowCounter>>,
        store_policy: StorePolicy,
        events: Arc<dyn SecurityEventSink>,
    ) -> Self {
        Self {
            policies,
            store,
            store_policy,
            local: LocalWindowCounter::new(),
            events,
        }
    }

    /// Check a request against its bucket's policy.
    ///
    /// Never returns an error: store trouble resolves through the
    /// degradation policy, and malformed addresses resolve to the shared
    /// unknown bucket.
    pub async fn check_rate_limit(&self, request: RateLimitRequest<'_>) -> RateLimitDecision {
        let policy = self.policies.policy(request.bucket);
        let ip = resolve_client_ip(request.ip_address, request.headers);
        let ip_hash = hash_ip(&ip);
        let key = derive_key(request.bucket, request.route, &ip_hash, request.user_id);
        let now_ms = current_time_millis();

        let arbitrated = match &self.store {
            Some(store) => store
                .try_acquire(&key, policy.window_ms, policy.max_events, now_ms)
                .await
                .map_err(|e| e.to_string()),
            None => Err("shared store not configured".to_string()),
        };

        let acquisition = match arbitrated {
            Ok(acquisition) => acquisition,
            Err(reason) => {
                warn!(
                    key = %key,
                    bucket = %request.bucket,
                    reason = %reason,
                    "Shared rate limit store unavailable"
                );
                self.record_unavailable(&request, &reason).await;

                match self.store_policy {
                    StorePolicy::Required => {
                        // Fail closed: a required store is never bypassed,
                        // so callers cannot slip past global enforcement.
                        counter!(
                            "rate_limit_exceeded_total",
                            "bucket" => request.bucket.as_str()
                        )
                        .increment(1);
                        return RateLimitDecision::blocked(
                            policy.window_ms,
                            policy.max_events,
                            policy.window_ms,
                            key,
                            ip_hash,
                        );
                    }
                    StorePolicy::Optional => self.local.try_acquire_at(
                        &key,
                        policy.window_ms,
                        policy.max_events,
                        now_ms,
                    ),
                }
            }
        };

        let decision = self.decision_from(acquisition, &policy, key, ip_hash);

        if !decision.allowed {
            counter!(
                "rate_limit_exceeded_total",
                "bucket" => request.bucket.as_str()
            )
            .increment(1);
            debug!(key = %decision.key, bucket = %request.bucket, "Rate limit exceeded");
            self.record_exceeded(&request, &decision).await;
        }

        decision
    }

    /// Check a request and raise a typed error when it is refused.
    ///
    /// The error carries the bucket and retry-after for the caller to
    /// render a 429; see [`RateLimitedError::apply`].
    pub async fn enforce_rate_limit(
        &self,
        request: RateLimitRequest<'_>,
    ) -> std::result::Result<RateLimitDecision, RateLimitedError> {
        let bucket = request.bucket;
        let decision = self.check_rate_limit(request).await;

        if decision.allowed {
            Ok(decision)
        } else {
            Err(RateLimitedError {
                bucket,
                retry_after_ms: decision.retry_after_ms,
            })
        }
    }

    /// Drop idle local-fallback keys whose events have all expired.
    pub fn purge_local_state(&self) {
        self.local.purge_expired(current_time_millis());
    }

    fn decision_from(
        &self,
        acquisition: Acquisition,
        policy: &BucketPolicy,
        key: String,
        ip_hash: String,
    ) -> RateLimitDecision {
        if acquisition.allowed {
            RateLimitDecision::allowed(
                acquisition.remaining,
                policy.max_events,
                policy.window_ms,
                key,
                ip_hash,
            )
        } else {
            RateLimitDecision::blocked(
                acquisition.retry_after_ms,
                policy.max_events,
                policy.window_ms,
                key,
                ip_hash,
            )
        }
    }

    async fn record_exceeded(&self, request: &RateLimitRequest<'_>, decision: &RateLimitDecision) {
        self.events
            .record(SecurityEvent {
                event_type: SecurityEventType::RateLimitExceeded,
                user_id: request.user_id.map(str::to_string),
                headers: request.headers.clone(),
                metadata: json!({
                    "bucket": request.bucket.as_str(),
                    "route": request.route,
                    "ip_hash": decision.ip_hash,
                    "retry_after_ms": decision.retry_after_ms,
                    "limit": decision.limit,
                    "window_ms": decision.window_ms,
                }),
            })
            .await;
    }

    async fn record_unavailable(&self, request: &RateLimitRequest<'_>, reason: &str) {
        self.events
            .record(SecurityEvent {
                event_type: SecurityEventType::RateLimitUnavailable,
                user_id: request.user_id.map(str::to_string),
                headers: request.headers.clone(),
                metadata: json!({
                    "bucket": request.bucket.as_str(),
                    "route": request.route,
                    "store_policy": self.store_policy.as_str(),
                    "reason": reason,
                }),
            })
            .await;
    }
}
