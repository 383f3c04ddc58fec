//! ---
//! vista_section: "02-service-health"
//! vista_subsection: "module"
//! vista_type: "source"
//! vista_scope: "code"
//! vista_description: "Service health and degradation manager."
//! vista_version: "v0.1.0"
//! vista_owner: "platform-reliability"
//! ---
//! Retry policy with exponential backoff and jitter.
//!
//! The executor loop itself lives on [`crate::manager::HealthManager`];
//! this module only shapes the delays.

use std::time::Duration;

use rand::Rng;

/// Policy parameters controlling retry attempts and backoff scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up (at least 1).
    pub max_attempts: u32,
    /// Base delay applied before the second attempt (exponential growth).
    pub base_delay: Duration,
    /// Maximum random jitter added to each delay to avoid thundering herds.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Construct a policy, clamping `max_attempts` to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter,
        }
    }

    /// A single attempt with no waiting, for tiers that should fail fast.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Calculate the delay after the provided attempt (1-indexed).
    ///
    /// Doubles per attempt with the exponent capped, plus jitter drawn
    /// fresh per call so concurrent callers do not march in lockstep.
    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(8);
        let base = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        if self.jitter.is_zero() {
            base
        } else {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis().max(1)) as u64;
            base + Duration::from_millis(jitter_ms)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::ZERO);
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn exponent_is_capped() {
        let policy = RetryPolicy::new(64, Duration::from_millis(10), Duration::ZERO);
        assert_eq!(policy.backoff_delay(9), policy.backoff_delay(40));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::new(3, Duration::from_millis(50), Duration::from_millis(20));
        for _ in 0..32 {
            let delay = policy.backoff_delay(1);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(70));
        }
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
    }
}
