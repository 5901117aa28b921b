//! Rate limit buckets and their window policies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{FloodgateError, Result};

/// A named abuse category with its own window/limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitBucket {
    /// Login, registration and credential flows
    Auth,
    /// General API traffic
    Api,
    /// Report and data exports
    Export,
    /// Membership join requests
    JoinRequest,
    /// Invite link redemption
    InviteLink,
    /// Administrative actions
    Admin,
}

impl RateLimitBucket {
    /// All known buckets, in a stable order.
    pub const ALL: [RateLimitBucket; 6] = [
        RateLimitBucket::Auth,
        RateLimitBucket::Api,
        RateLimitBucket::Export,
        RateLimitBucket::JoinRequest,
        RateLimitBucket::InviteLink,
        RateLimitBucket::Admin,
    ];

    /// Get the bucket name for keys, logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitBucket::Auth => "auth",
            RateLimitBucket::Api => "api",
            RateLimitBucket::Export => "export",
            RateLimitBucket::JoinRequest => "join_request",
            RateLimitBucket::InviteLink => "invite_link",
            RateLimitBucket::Admin => "admin",
        }
    }

    /// The built-in policy applied when configuration has no override.
    pub fn default_policy(&self) -> BucketPolicy {
        match self {
            RateLimitBucket::Auth => BucketPolicy::new(15 * 60 * 1000, 5),
            RateLimitBucket::Api => BucketPolicy::new(60 * 1000, 120),
            RateLimitBucket::Export => BucketPolicy::new(5 * 60 * 1000, 10),
            RateLimitBucket::JoinRequest => BucketPolicy::new(60 * 60 * 1000, 20),
            RateLimitBucket::InviteLink => BucketPolicy::new(60 * 60 * 1000, 30),
            RateLimitBucket::Admin => BucketPolicy::new(60 * 1000, 60),
        }
    }
}

impl std::fmt::Display for RateLimitBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The window/limit pair enforced for one bucket.
///
/// Policies are static configuration: loaded once at process start,
/// never mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPolicy {
    /// Rolling window duration in milliseconds
    pub window_ms: u64,
    /// Maximum events admitted within the window
    pub max_events: u32,
}

impl BucketPolicy {
    /// Create a new policy.
    pub fn new(window_ms: u64, max_events: u32) -> Self {
        Self {
            window_ms,
            max_events,
        }
    }

    fn validate(&self, bucket: RateLimitBucket) -> Result<()> {
        if self.window_ms == 0 || self.max_events == 0 {
            return Err(FloodgateError::Config(format!(
                "bucket {} requires a positive window and limit",
                bucket
            )));
        }
        Ok(())
    }
}

/// The full bucket-to-policy table resolved at startup.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<RateLimitBucket, BucketPolicy>,
}

impl PolicyTable {
    /// Build a table from the built-in defaults.
    pub fn with_defaults() -> Self {
        let policies = RateLimitBucket::ALL
            .iter()
            .map(|b| (*b, b.default_policy()))
            .collect();
        Self { policies }
    }

    /// Build a table from the defaults plus configured overrides.
    pub fn with_overrides(overrides: &HashMap<RateLimitBucket, BucketPolicy>) -> Result<Self> {
        let mut table = Self::with_defaults();
        for (bucket, policy) in overrides {
            policy.validate(*bucket)?;
            table.policies.insert(*bucket, *policy);
        }
        Ok(table)
    }

    /// Look up the policy for a bucket.
    pub fn policy(&self, bucket: RateLimitBucket) -> BucketPolicy {
        // The table is seeded with every bucket, so the lookup cannot miss.
        self.policies[&bucket]
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        assert_eq!(RateLimitBucket::Auth.as_str(), "auth");
        assert_eq!(RateLimitBucket::JoinRequest.as_str(), "join_request");
        assert_eq!(RateLimitBucket::InviteLink.as_str(), "invite_link");
    }

    #[test]
    fn test_default_policies_are_positive() {
        for bucket in RateLimitBucket::ALL {
            let policy = bucket.default_policy();
            assert!(policy.window_ms > 0);
            assert!(policy.max_events > 0);
        }
    }

    #[test]
    fn test_table_covers_every_bucket() {
        let table = PolicyTable::with_defaults();
        for bucket in RateLimitBucket::ALL {
            let _ = table.policy(bucket);
        }
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert(RateLimitBucket::Export, BucketPolicy::new(1000, 2));

        let table = PolicyTable::with_overrides(&overrides).unwrap();
        assert_eq!(table.policy(RateLimitBucket::Export).max_events, 2);
        assert_eq!(
            table.policy(RateLimitBucket::Auth),
            RateLimitBucket::Auth.default_policy()
        );
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert(RateLimitBucket::Api, BucketPolicy::new(0, 10));
        assert!(PolicyTable::with_overrides(&overrides).is_err());

        let mut overrides = HashMap::new();
        overrides.insert(RateLimitBucket::Api, BucketPolicy::new(1000, 0));
        assert!(PolicyTable::with_overrides(&overrides).is_err());
    }
}
