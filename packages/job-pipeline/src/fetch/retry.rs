//! Backoff arithmetic for the rate-limited fetcher.

use std::time::Duration;

use crate::types::config::RetryPolicy;

impl RetryPolicy {
    /// Exponential backoff for `attempt` (0-based): `base_delay * 2^attempt`,
    /// capped at `max_delay`. Non-decreasing in `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }

    /// Delay before retrying after `attempt` failed: the larger of the
    /// server's `Retry-After` and the computed backoff.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        match retry_after {
            Some(server) => server.max(backoff),
            None => backoff,
        }
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new()
            .with_base_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(60))
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let p = policy();
        assert_eq!(p.backoff(0), Duration::from_secs(2));
        assert_eq!(p.backoff(1), Duration::from_secs(4));
        assert_eq!(p.backoff(4), Duration::from_secs(32));
        assert_eq!(p.backoff(5), Duration::from_secs(60));
        assert_eq!(p.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_wins_when_larger() {
        let p = policy();
        assert_eq!(p.delay_for(0, Some(Duration::from_secs(3))), Duration::from_secs(3));
        assert_eq!(p.delay_for(3, Some(Duration::from_secs(3))), Duration::from_secs(16));
        assert_eq!(p.delay_for(1, None), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_budget() {
        let p = policy().with_max_retries(2);
        assert!(p.can_retry(0));
        assert!(p.can_retry(1));
        assert!(!p.can_retry(2));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic(
            base_ms in 1u64..5_000,
            cap_s in 1u64..600,
            k in 0u32..64,
            step in 1u32..64,
        ) {
            let p = RetryPolicy::new()
                .with_base_delay(Duration::from_millis(base_ms))
                .with_max_delay(Duration::from_secs(cap_s));
            prop_assert!(p.backoff(k + step) >= p.backoff(k));
        }

        #[test]
        fn delay_never_below_retry_after(k in 0u32..32, server_s in 0u64..3_600) {
            let server = Duration::from_secs(server_s);
            prop_assert!(policy().delay_for(k, Some(server)) >= server);
        }
    }
}
