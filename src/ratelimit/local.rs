//! In-process sliding-window counter.
//!
//! Used only while the shared store is unavailable and not required.
//! State is owned exclusively by this process: it is never shared with
//! other instances, never persisted, and lost on restart. That weaker
//! guarantee is accepted for degraded operation; within one process the
//! no-more-than-limit invariant still holds.

use async_trait::async_trait;
use dashmap::DashMap;

use super::counter::{Acquisition, WindowCounter};
use crate::error::Result;

/// Timestamps recorded for one key, oldest first.
#[derive(Debug, Default)]
struct KeyWindow {
    /// Window duration the key was last checked against
    window_ms: u64,
    /// Admission timestamps in unix milliseconds
    hits: Vec<u64>,
}

/// Per-process fallback counter.
///
/// One ordered timestamp list per key, pruned lazily on each check. The
/// map shard lock is held only for the in-memory computation, never
/// across I/O.
#[derive(Debug, Default)]
pub struct LocalWindowCounter {
    windows: DashMap<String, KeyWindow>,
}

impl LocalWindowCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Try to admit one event for `key` at `now_ms`.
    ///
    /// Same eviction and retry-after semantics as the durable counter:
    /// entries with timestamp <= `now_ms - window_ms` are expired before
    /// counting, and a refused attempt reports how long until the oldest
    /// counted event leaves the window.
    pub fn try_acquire_at(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
        now_ms: u64,
    ) -> Acquisition {
        let mut entry = self.windows.entry(key.to_string()).or_default();
        entry.window_ms = window_ms;

        let cutoff = now_ms.saturating_sub(window_ms);
        entry.hits.retain(|&ts| ts > cutoff);

        if entry.hits.len() as u32 >= limit {
            let oldest = entry.hits.first().copied().unwrap_or(now_ms);
            let retry_after_ms = window_ms.saturating_sub(now_ms.saturating_sub(oldest));
            return Acquisition::blocked(retry_after_ms);
        }

        entry.hits.push(now_ms);
        Acquisition::allowed(limit - entry.hits.len() as u32)
    }

    /// Drop keys whose recorded events have all expired.
    ///
    /// Pruning is lazy on each check, so this sweep only bounds memory
    /// for keys that went idle; correctness never depends on it.
    pub fn purge_expired(&self, now_ms: u64) {
        self.windows.retain(|_, window| {
            let cutoff = now_ms.saturating_sub(window.window_ms);
            window.hits.iter().any(|&ts| ts > cutoff)
        });
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl WindowCounter for LocalWindowCounter {
    async fn try_acquire(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
        now_ms: u64,
    ) -> Result<Acquisition> {
        Ok(self.try_acquire_at(key, window_ms, limit, now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: u64 = 15 * 60 * 1000;

    #[test]
    fn test_limit_exhausts_then_blocks() {
        let counter = LocalWindowCounter::new();
        let now = 1_700_000_000_000;

        // Five admissions count down the remaining slots.
        for expected_remaining in (0..5).rev() {
            let acq = counter.try_acquire_at("k", WINDOW, 5, now);
            assert!(acq.allowed);
            assert_eq!(acq.remaining, expected_remaining);
        }

        // The sixth is refused with nearly a full window to wait.
        let acq = counter.try_acquire_at("k", WINDOW, 5, now + 1000);
        assert!(!acq.allowed);
        assert_eq!(acq.remaining, 0);
        assert_eq!(acq.retry_after_ms, WINDOW - 1000);
    }

    #[test]
    fn test_window_slides_open_again() {
        let counter = LocalWindowCounter::new();
        let now = 1_700_000_000_000;

        for _ in 0..5 {
            assert!(counter.try_acquire_at("k", WINDOW, 5, now).allowed);
        }
        assert!(!counter.try_acquire_at("k", WINDOW, 5, now + 1).allowed);

        // Once the window has fully elapsed the old events no longer count.
        let later = now + WINDOW + 1;
        let acq = counter.try_acquire_at("k", WINDOW, 5, later);
        assert!(acq.allowed);
        assert_eq!(acq.remaining, 4);
    }

    #[test]
    fn test_partial_expiry_frees_slots_incrementally() {
        let counter = LocalWindowCounter::new();
        let window = 10_000;

        assert!(counter.try_acquire_at("k", window, 2, 1_000).allowed);
        assert!(counter.try_acquire_at("k", window, 2, 6_000).allowed);
        assert!(!counter.try_acquire_at("k", window, 2, 7_000).allowed);

        // The first event (t=1000) expires at t=11000; the second has not.
        let acq = counter.try_acquire_at("k", window, 2, 11_001);
        assert!(acq.allowed);
        assert_eq!(acq.remaining, 0);
    }

    #[test]
    fn test_retry_after_bounded_by_window() {
        let counter = LocalWindowCounter::new();
        let window = 10_000;

        assert!(counter.try_acquire_at("k", window, 1, 1_000).allowed);
        let acq = counter.try_acquire_at("k", window, 1, 4_000);
        assert!(!acq.allowed);
        assert!(acq.retry_after_ms > 0);
        assert!(acq.retry_after_ms <= window);
        assert_eq!(acq.retry_after_ms, 7_000);
    }

    #[test]
    fn test_keys_are_isolated() {
        let counter = LocalWindowCounter::new();
        let now = 1_700_000_000_000;

        assert!(counter.try_acquire_at("a", WINDOW, 1, now).allowed);
        assert!(!counter.try_acquire_at("a", WINDOW, 1, now).allowed);

        // A different key has its own quota.
        assert!(counter.try_acquire_at("b", WINDOW, 1, now).allowed);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_limit() {
        let counter = Arc::new(LocalWindowCounter::new());
        let now = 1_700_000_000_000;
        let limit = 10;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    let mut admitted = 0u32;
                    for _ in 0..10 {
                        if counter.try_acquire_at("k", WINDOW, limit, now).allowed {
                            admitted += 1;
                        }
                    }
                    admitted
                })
            })
            .collect();

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, limit);
    }

    #[test]
    fn test_purge_drops_idle_keys() {
        let counter = LocalWindowCounter::new();
        let window = 10_000;

        counter.try_acquire_at("a", window, 5, 1_000);
        counter.try_acquire_at("b", window, 5, 9_000);
        assert_eq!(counter.tracked_keys(), 2);

        counter.purge_expired(12_000);
        assert_eq!(counter.tracked_keys(), 1);

        counter.purge_expired(20_000);
        assert_eq!(counter.tracked_keys(), 0);
    }
}
