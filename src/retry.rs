// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Per-key retry policy with capped exponential backoff.
//!
//! The policy is a pure function from failure count to delay, decoupled from
//! the queue's storage so the curve is independently testable. The queue owns
//! the per-key failure counters; this module only decides how long a given
//! attempt waits and when the budget is exhausted.

use std::time::Duration;

use crate::constants::{MAX_RECONCILE_REQUEUES, RETRY_BASE_DELAY_MILLIS, RETRY_MAX_DELAY_SECS};

/// Capped exponential backoff policy for failing reconciliation keys.
///
/// The nth consecutive failure of a key waits `base_delay * 2^n`, clamped to
/// `max_delay`. Once a key has been requeued `max_requeues` times the worker
/// loop stops retrying it and reports a terminal error.
///
/// # Retry Schedule
///
/// With the defaults (5ms base, 1000s cap), retries occur at approximately:
///
/// 1. 5ms
/// 2. 10ms
/// 3. 20ms
/// 4. 40ms
/// 5. 80ms
/// 6. 160ms
/// 7. 320ms
/// 8. 640ms
/// 9. 1.28s
/// 10. 2.56s
///     11-20. doubling until the key is dropped after 20 requeues
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Delay applied to the first failure
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Number of rate-limited requeues before giving up on a key
    pub max_requeues: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MILLIS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
            max_requeues: MAX_RECONCILE_REQUEUES,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit knobs.
    ///
    /// # Arguments
    /// * `base_delay` - Delay for the first failure
    /// * `max_delay` - Cap applied to every delay
    /// * `max_requeues` - Retry budget before a key is dropped
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, max_requeues: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_requeues,
        }
    }

    /// Delay before re-adding a key that has already failed `attempt` times.
    ///
    /// Pure and deterministic: `min(base_delay * 2^attempt, max_delay)`.
    /// Saturates instead of overflowing for absurd attempt counts.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.min(63);
        let nanos = self
            .base_delay
            .as_nanos()
            .saturating_mul(1u128 << exp)
            .min(self.max_delay.as_nanos());
        // Capped at max_delay, which fits u64 nanoseconds for any sane cap.
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Whether a key with `requeues` recorded failures has consumed its budget.
    #[must_use]
    pub fn retries_exhausted(&self, requeues: u32) -> bool {
        requeues >= self.max_requeues
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
