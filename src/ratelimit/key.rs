//! Counting key derivation.
//!
//! A key is the ordered concatenation of bucket, normalized route token,
//! IP hash and user token under a fixed prefix. Identical
//! (bucket, route, ip, user) inputs always produce the same key, and the
//! bucket token leads the key, so quotas can never collide across buckets.

use super::bucket::RateLimitBucket;

/// Prefix shared by every counting key in the store.
const KEY_PREFIX: &str = "ratelimit";

/// Token substituted for an empty normalized route.
const ROOT_ROUTE: &str = "root";

/// Token substituted for an unauthenticated caller.
const ANON_USER: &str = "anon";

/// Normalize a route identifier into a key-safe token.
///
/// Lowercases, trims leading/trailing separators, and collapses every run
/// of characters outside `[a-z0-9:_-]` into a single `-`. An empty result
/// becomes `root`.
pub fn normalize_route(route: &str) -> String {
    let mut token = String::with_capacity(route.len());
    let mut pending_separator = false;

    for c in route.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-') {
            if pending_separator && !token.is_empty() {
                token.push('-');
            }
            pending_separator = false;
            token.push(c);
        } else {
            pending_separator = true;
        }
    }

    if token.is_empty() {
        ROOT_ROUTE.to_string()
    } else {
        token
    }
}

/// Derive the counting key for one (bucket, route, ip, user) combination.
///
/// The user token defaults to `anon` when no authenticated user is known,
/// so anonymous traffic shares a per-IP quota while each authenticated
/// user gets their own.
pub fn derive_key(
    bucket: RateLimitBucket,
    route: &str,
    ip_hash: &str,
    user_id: Option<&str>,
) -> String {
    let user = user_id.filter(|u| !u.is_empty()).unwrap_or(ANON_USER);
    format!(
        "{}:{}:{}:{}:{}",
        KEY_PREFIX,
        bucket.as_str(),
        normalize_route(route),
        ip_hash,
        user
    )
}
