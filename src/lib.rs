//! Floodgate - Distributed Sliding-Window Rate Limiting
//!
//! This crate implements the rate limiting subsystem shared by every
//! abuse-sensitive surface of the application: atomic distributed
//! counting against a shared Redis store, best-effort local fallback
//! when the store is optional and unreachable, fail-closed enforcement
//! when it is required, privacy-preserving key derivation, and
//! security-event telemetry for abuse detection.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod telemetry;

pub use config::{FloodgateConfig, StoreConfig, StorePolicy};
pub use error::{FloodgateError, RateLimitedError, Result};
pub use ratelimit::{RateLimitBucket, RateLimitDecision, RateLimitRequest, RateLimiter};
pub use telemetry::{SecurityEvent, SecurityEventSink, SecurityEventType};
