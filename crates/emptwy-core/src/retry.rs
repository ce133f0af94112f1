//! ============================================================================
//! Retry Policy - Re-queue Limits & Backoff for Failed Deletions
//! ============================================================================
//! Decides what happens after a transient deletion failure:
//! - Whether the status goes back on the queue (optional attempt cap)
//! - How long the worker waits before re-queueing (exponential backoff)
//!
//! The default policy retries forever with no delay: a status that keeps
//! failing keeps the pipeline running until the process is killed.
//! ============================================================================

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for deletion retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum delete attempts per status; None retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Base delay before re-queueing (multiplied by 2^(attempt-1)); 0 disables backoff
    #[serde(default)]
    pub base_delay_ms: u64,
    /// Maximum delay before re-queueing
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add up to 50% random jitter to delays
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay_ms: 0,
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Whether a status that has failed `attempts` times may be tried again
    pub fn should_retry(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }

    /// Delay to wait after the `attempts`-th failure (1-based)
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }

        // Cap exponent to prevent overflow
        let exponent = attempts.saturating_sub(1).min(63);
        let multiplier = 2u64.saturating_pow(exponent);
        let capped = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);

        let final_delay = if self.jitter {
            let jitter_factor = 1.0 + rand::thread_rng().gen_range(0.0..0.5);
            (capped as f64 * jitter_factor) as u64
        } else {
            capped
        };

        Duration::from_millis(final_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.base_delay_ms, 0);
        assert!(!policy.jitter);

        // Unbounded, immediate
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(u32::MAX));
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(50), Duration::ZERO);
    }

    #[test]
    fn test_attempt_cap() {
        let policy = RetryPolicy {
            max_attempts: Some(3),
            ..Default::default()
        };

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy {
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            ..Default::default()
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(8000));
        // Should be capped at max_delay_ms
        assert_eq!(policy.delay_for(10), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(10_000));
    }

    #[test]
    fn test_delay_with_jitter() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter: true,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 4}"#).unwrap();
        assert_eq!(policy.max_attempts, Some(4));
        assert_eq!(policy.base_delay_ms, 0);
        assert_eq!(policy.max_delay_ms, 60_000);
    }
}
