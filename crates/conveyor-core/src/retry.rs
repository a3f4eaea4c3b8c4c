//! Retry policy: bounded attempts and the delay between them.

use std::time::Duration;

/// Retry policy for broker operations.
///
/// Used twice with different numbers:
/// - connection establishment (30 attempts, 1s constant delay)
/// - a single publish inside a producer session (5 attempts, 100ms backoff)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Backoff multiplier. `1.0` keeps the delay constant.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Broker connection establishment: 30 attempts, 1s apart.
    pub fn connect_default() -> Self {
        Self::constant(30, Duration::from_secs(1))
    }

    /// Publish retry inside a producer session: 5 attempts, 100ms apart.
    pub fn publish_default() -> Self {
        Self::constant(5, Duration::from_millis(100))
    }

    /// Delay to wait after `attempts` failed attempts (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_default_matches_startup_budget() {
        let policy = RetryPolicy::connect_default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(29), Duration::from_secs(1));
    }

    #[test]
    fn publish_default_is_short() {
        let policy = RetryPolicy::publish_default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
        };

        // attempt 1: 2s, attempt 2: 4s, attempt 3: 8s
        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn retry_stops_at_max_attempts() {
        let policy = RetryPolicy::constant(3, Duration::from_millis(1));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
