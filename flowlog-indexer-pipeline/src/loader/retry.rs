//! Retry policy for bulk writes.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with equal jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of bulk calls per item, counting the first one.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound of any single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff ceiling before retry number `retry` (1-based): the initial
    /// delay doubled per retry, capped at the maximum.
    pub fn ceiling(&self, retry: u32) -> Duration {
        let mut delay_ms = self.initial_delay_ms;
        for _ in 1..retry {
            delay_ms = std::cmp::min(delay_ms.saturating_mul(2), self.max_delay_ms);
            if delay_ms == self.max_delay_ms {
                break;
            }
        }
        Duration::from_millis(std::cmp::min(delay_ms, self.max_delay_ms))
    }

    /// Delay before retry number `retry`, drawn from `[ceiling / 2, ceiling]`.
    pub fn delay(&self, retry: u32) -> Duration {
        let ceiling_ms = self.ceiling(retry).as_millis() as u64;
        let delay_ms = rand::thread_rng().gen_range(ceiling_ms / 2..=ceiling_ms);
        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
        };

        assert_eq!(policy.ceiling(1), Duration::from_millis(100));
        assert_eq!(policy.ceiling(2), Duration::from_millis(200));
        assert_eq!(policy.ceiling(3), Duration::from_millis(400));
        assert_eq!(policy.ceiling(4), Duration::from_millis(800));
        assert_eq!(policy.ceiling(5), Duration::from_millis(1000));
        assert_eq!(policy.ceiling(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_delay_is_jittered_within_bounds() {
        let policy = RetryPolicy::default();

        for retry in 1..=6 {
            let ceiling = policy.ceiling(retry);
            for _ in 0..50 {
                let delay = policy.delay(retry);
                assert!(delay >= ceiling / 2 && delay <= ceiling);
            }
        }
    }

    #[test]
    fn test_allows_retry_after() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry_after(1));
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));

        let single = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert!(!single.allows_retry_after(1));
    }
}
