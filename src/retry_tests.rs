// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::RetryPolicy;
    use std::time::Duration;

    /// Test that the default policy has the expected knobs
    #[test]
    fn test_default_policy_configuration() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.base_delay,
            Duration::from_millis(5),
            "Base delay should be 5ms"
        );
        assert_eq!(
            policy.max_delay,
            Duration::from_secs(1000),
            "Max delay should be 1000 seconds"
        );
        assert_eq!(policy.max_requeues, 20, "Retry budget should be 20");
    }

    /// Test that the delay doubles with each failure
    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(0), Duration::from_millis(5));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for(10), Duration::from_millis(5 * 1024));
    }

    /// Test that the delay is capped at max_delay
    #[test]
    fn test_delay_caps_at_max() {
        let policy = RetryPolicy::default();

        // 5ms * 2^18 = ~1311s, past the 1000s cap
        assert_eq!(policy.delay_for(18), Duration::from_secs(1000));
        assert_eq!(policy.delay_for(40), Duration::from_secs(1000));
    }

    /// Test that absurd attempt counts saturate instead of overflowing
    #[test]
    fn test_delay_saturates_on_large_attempts() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(u32::MAX), policy.max_delay);
    }

    /// Test that the policy is a pure function of the attempt count
    #[test]
    fn test_delay_is_deterministic() {
        let policy = RetryPolicy::default();

        for attempt in 0..25 {
            assert_eq!(
                policy.delay_for(attempt),
                policy.delay_for(attempt),
                "delay_for must be deterministic for attempt {attempt}"
            );
        }
    }

    /// Test the exhaustion threshold boundary
    #[test]
    fn test_retries_exhausted_boundary() {
        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_secs(1), 20);

        assert!(!policy.retries_exhausted(0));
        assert!(!policy.retries_exhausted(19));
        assert!(policy.retries_exhausted(20));
        assert!(policy.retries_exhausted(21));
    }

    /// Test a custom policy with a tiny budget
    #[test]
    fn test_custom_policy() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(4), 3);

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4), "capped");
        assert!(policy.retries_exhausted(3));
    }
}
