//! Retry policy — exponential backoff with cap and jitter.
//!
//! Pure scheduling: the policy owns no clock and performs no waiting. Given
//! the index of the attempt that just failed and its classification, it
//! answers either "stop" or "wait this long before the next attempt". The
//! invoker does the actual sleeping.

use std::time::Duration;

use tidegate_core::FailureKind;

/// Backoff configuration for a single logical operation.
///
/// The delay before attempt *n* (n ≥ 2) is
/// `min(max_delay, base_delay * multiplier^(n-2))`, scaled by a uniformly
/// random factor in `[1 - jitter_fraction, 1 + jitter_fraction]` so
/// concurrent callers don't retry in lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first (≥ 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Cap applied to the raw exponential delay, before jitter.
    pub max_delay: Duration,
    /// Exponential growth factor (> 1).
    pub multiplier: f64,
    /// Jitter half-width as a fraction of the delay, in [0, 1).
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Give up: attempts exhausted or the failure is non-retryable.
    Stop,
    /// Wait this long, then make the next attempt.
    RetryAfter(Duration),
}

impl RetryPolicy {
    /// A policy that never retries: one attempt, period.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Decide what follows the failure of `failed_attempt` (1-based).
    ///
    /// A non-retryable classification stops immediately regardless of
    /// remaining attempts; the classification comes from the error value,
    /// never from the policy.
    pub fn decide(&self, failed_attempt: u32, kind: FailureKind) -> RetryDecision {
        if !kind.is_retryable() {
            return RetryDecision::Stop;
        }
        if failed_attempt >= self.max_attempts {
            return RetryDecision::Stop;
        }
        RetryDecision::RetryAfter(self.delay_before(failed_attempt + 1))
    }

    /// The jittered delay preceding attempt `attempt` (≥ 2).
    fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2) as i32;
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped * self.jitter_factor())
    }

    /// Uniform factor in `[1 - jitter, 1 + jitter]`.
    fn jitter_factor(&self) -> f64 {
        if self.jitter_fraction <= 0.0 {
            return 1.0;
        }
        use rand::Rng;
        let mut rng = rand::rng();
        rng.random_range(1.0 - self.jitter_fraction..=1.0 + self.jitter_fraction)
    }
}
