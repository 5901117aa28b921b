//! Configuration management for Floodgate.
//!
//! Configuration is resolved once at startup and never mutates at
//! runtime: a shared-store section and per-bucket policy overrides on
//! top of the built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{FloodgateError, Result};
use crate::ratelimit::{BucketPolicy, PolicyTable, RateLimitBucket};

/// Main configuration for the rate limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// Shared counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-bucket overrides applied on top of the built-in policies
    #[serde(default)]
    pub buckets: HashMap<RateLimitBucket, BucketPolicy>,
}

/// Shared counter store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL for the shared store; unset disables it
    #[serde(default)]
    pub url: Option<String>,

    /// Whether decisions may degrade to local counting
    #[serde(default)]
    pub policy: StorePolicy,
}

/// How strictly the shared store is required for enforcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorePolicy {
    /// The store must arbitrate every decision; fail closed without it.
    /// Use for globally limited actions such as exports and admin calls.
    Required,
    /// Prefer the store, degrade to best-effort local counting when it
    /// is unreachable.
    #[default]
    Optional,
}

impl StorePolicy {
    /// Get the policy name for logging and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorePolicy::Required => "required",
            StorePolicy::Optional => "optional",
        }
    }
}

impl FloodgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Resolve the full bucket policy table, validating overrides.
    pub fn policy_table(&self) -> Result<PolicyTable> {
        PolicyTable::with_overrides(&self.buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = FloodgateConfig::from_yaml("{}").unwrap();
        assert!(config.store.url.is_none());
        assert_eq!(config.store.policy, StorePolicy::Optional);

        let table = config.policy_table().unwrap();
        assert_eq!(
            table.policy(RateLimitBucket::Auth),
            RateLimitBucket::Auth.default_policy()
        );
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  url: redis://127.0.0.1:6379
  policy: required
buckets:
  auth:
    window_ms: 900000
    max_events: 5
  export:
    window_ms: 300000
    max_events: 10
"#;
        let config = FloodgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.store.policy, StorePolicy::Required);

        let table = config.policy_table().unwrap();
        assert_eq!(table.policy(RateLimitBucket::Auth).max_events, 5);
        assert_eq!(table.policy(RateLimitBucket::Export).window_ms, 300_000);
        // Buckets without overrides keep their defaults.
        assert_eq!(
            table.policy(RateLimitBucket::Api),
            RateLimitBucket::Api.default_policy()
        );
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        let result = FloodgateConfig::from_yaml("store: [not, a, map]");
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_zero_policy_override_rejected() {
        let yaml = r#"
buckets:
  api:
    window_ms: 0
    max_events: 10
"#;
        let config = FloodgateConfig::from_yaml(yaml).unwrap();
        assert!(config.policy_table().is_err());
    }

    #[test]
    fn test_store_policy_names() {
        assert_eq!(StorePolicy::Required.as_str(), "required");
        assert_eq!(StorePolicy::Optional.as_str(), "optional");
    }
}
