//! Client address resolution and privacy-preserving IP hashing.
//!
//! Resolution is best-effort by design: malformed input never fails a
//! request, it degrades to the next strategy and terminates at a shared
//! "unknown" address so unexplained traffic pools into one bucket.

use http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Sentinel address shared by all traffic whose origin cannot be resolved.
pub const UNKNOWN_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Proxy header carrying the comma-separated forwarding chain.
const FORWARDED_FOR: &str = "x-forwarded-for";
/// Proxy header carrying a single client address.
const REAL_IP: &str = "x-real-ip";

/// Length of the truncated hex digest kept in keys and telemetry.
const IP_HASH_LEN: usize = 16;

/// Resolve the best-effort client address for a request.
///
/// Tries, in order: an explicit caller-supplied value, the first valid
/// `X-Forwarded-For` candidate, then `X-Real-IP`. A trailing port is
/// stripped from any candidate. Falls back to [`UNKNOWN_IP`].
pub fn resolve_client_ip(explicit: Option<&str>, headers: &HeaderMap) -> IpAddr {
    if let Some(ip) = explicit.and_then(parse_ip_candidate) {
        return ip;
    }

    if let Some(forwarded) = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').find_map(parse_ip_candidate) {
            return ip;
        }
    }

    if let Some(ip) = headers
        .get(REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_ip_candidate)
    {
        return ip;
    }

    UNKNOWN_IP
}

/// Parse one candidate address, accepting `ip` or `ip:port` forms.
fn parse_ip_candidate(raw: &str) -> Option<IpAddr> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Some(ip);
    }

    // "203.0.113.9:443" or "[2001:db8::1]:443" with the port stripped
    trimmed.parse::<SocketAddr>().map(|addr| addr.ip()).ok()
}

/// One-way hash of a resolved address for keys and telemetry.
///
/// SHA-256 over the canonical address string, truncated to 16 hex chars.
/// Deliberately unsalted and deterministic: counting keys must survive
/// process restarts and match across deployments, and telemetry must not
/// expose the raw address.
pub fn hash_ip(ip: &IpAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..IP_HASH_LEN].to_string()
}
