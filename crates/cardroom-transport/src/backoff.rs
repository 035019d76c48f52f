//! Reconnect backoff policy.
//!
//! When an established connection drops, the link retries with an
//! exponentially growing delay. A random jitter is added on top so that a
//! whole table of clients kicked by the same server restart does not
//! reconnect in lockstep.

use std::time::Duration;

use rand::Rng;

/// How (and whether) a lost connection is re-established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries (before jitter).
    pub max_delay: Duration,
    /// Give up after this many consecutive failed attempts.
    /// `None` retries forever; `Some(0)` never reconnects.
    pub max_attempts: Option<u32>,
    /// Maximum random jitter added to each delay.
    pub max_jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_attempts: Some(20),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            max_attempts: Some(0),
            ..Self::default()
        }
    }

    /// Returns `true` if another attempt is allowed after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    ///
    /// Doubles every attempt and saturates at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retry number `attempt`, including random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=jitter_ms);
        base + Duration::from_millis(jitter)
    }
}
