//! Rate limiting logic and state management.

mod bucket;
mod counter;
mod engine;
mod ip;
mod key;
mod local;
mod store;
mod types;

pub use bucket::{BucketPolicy, PolicyTable, RateLimitBucket};
pub use counter::{Acquisition, WindowCounter};
pub use engine::RateLimiter;
pub use ip::{hash_ip, resolve_client_ip, UNKNOWN_IP};
pub use key::{derive_key, normalize_route};
pub use local::LocalWindowCounter;
pub use store::RedisWindowStore;
pub use types::{current_time_millis, RateLimitDecision, RateLimitRequest};
