use std::time::Duration;

use rand::Rng;

/// Bounded retry with full-jitter backoff for CAS losers.
///
/// The loser of a version race re-reads and retries up to `max_attempts`
/// times, sleeping a random duration up to an exponentially growing cap
/// between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// No sleeping between attempts. Test use.
    pub fn no_backoff() -> Self {
        Self::new(3, Duration::ZERO)
    }

    /// Sleep before retrying `attempt` (1-based, the attempt that just
    /// failed).
    pub(crate) fn pause(&self, attempt: u32) {
        if self.base_backoff.is_zero() {
            return;
        }
        let cap = self.base_backoff.saturating_mul(1 << attempt.min(8));
        let jittered = rand::thread_rng().gen_range(Duration::ZERO..=cap);
        std::thread::sleep(jittered);
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn no_backoff_does_not_sleep() {
        let policy = RetryPolicy::no_backoff();
        let start = std::time::Instant::now();
        for attempt in 1..=policy.max_attempts {
            policy.pause(attempt);
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
