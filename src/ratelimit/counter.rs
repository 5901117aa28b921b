//! Sliding-window counter contract.

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of one admission attempt against a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquisition {
    /// Whether the event was admitted
    pub allowed: bool,
    /// Wait before the next slot frees, in milliseconds (0 when allowed)
    pub retry_after_ms: u64,
    /// Slots left in the window after this attempt
    pub remaining: u32,
}

impl Acquisition {
    /// An admitted event.
    pub fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            retry_after_ms: 0,
            remaining,
        }
    }

    /// A refused event.
    pub fn blocked(retry_after_ms: u64) -> Self {
        Self {
            allowed: false,
            retry_after_ms,
            remaining: 0,
        }
    }
}

/// Trait for sliding-window counter implementations.
///
/// This abstracts over the durable shared-store counter and the local
/// in-process fallback so the decision engine can work with either.
///
/// Semantics for every implementation: events older than
/// `now_ms - window_ms` never count; at most `limit` events are admitted
/// per key per rolling window; concurrent attempts for the same key must
/// serialize so the limit cannot be exceeded by racing callers.
#[async_trait]
pub trait WindowCounter: Send + Sync {
    /// Try to admit one event for `key` at `now_ms`.
    ///
    /// An `Err` means the counter itself was unreachable, not that the
    /// event was refused; the degradation policy decides what follows.
    async fn try_acquire(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
        now_ms: u64,
    ) -> Result<Acquisition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_constructors() {
        let allowed = Acquisition::allowed(3);
        assert!(allowed.allowed);
        assert_eq!(allowed.retry_after_ms, 0);
        assert_eq!(allowed.remaining, 3);

        let blocked = Acquisition::blocked(450);
        assert!(!blocked.allowed);
        assert_eq!(blocked.retry_after_ms, 450);
        assert_eq!(blocked.remaining, 0);
    }
}
