//! Exponential backoff with additive jitter.
//!
//! The delay before retry `n` (0-indexed) is
//! `backoff_base^n * retry_delay + jitter`, with `jitter` drawn from
//! `[0, retry_delay / 2)`. Jitter only ever lengthens the base delay.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::config::RetryPolicy;

/// Delay before retry `attempt` (0-indexed).
pub fn backoff_delay<R: Rng>(policy: &RetryPolicy, attempt: u32, rng: &mut R) -> Duration {
    let base_ns = u64::try_from(policy.retry_delay.as_nanos()).unwrap_or(u64::MAX);
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    // float-to-int casts saturate
    let scaled_ns = (policy.backoff_base.powi(exponent) * base_ns as f64) as u64;

    let half_ns = base_ns / 2;
    let jitter_ns = if half_ns > 0 {
        rng.gen_range(0..half_ns)
    } else {
        0
    };

    Duration::from_nanos(scaled_ns.saturating_add(jitter_ns))
}

/// Iterator of retry delays, consumed by `tokio_retry::RetryIf`.
#[derive(Debug)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    attempt: u32,
    rng: StdRng,
}

impl BackoffSchedule {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }

    /// Uses a caller-supplied RNG, e.g. a seeded one for reproducible delays.
    #[must_use]
    pub fn with_rng(policy: RetryPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            attempt: 0,
            rng,
        }
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_retry {
            return None;
        }
        let delay = backoff_delay(&self.policy, self.attempt, &mut self.rng);
        self.attempt += 1;
        Some(delay)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.policy.max_retry.saturating_sub(self.attempt) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn policy(max_retry: u32, delay_ms: u64, base: f64) -> RetryPolicy {
        RetryPolicy {
            max_retry,
            retry_delay: Duration::from_millis(delay_ms),
            backoff_base: base,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_delay_stays_within_jitter_window() {
        let policy = policy(6, 1_000, 2.0);
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..6 {
            for _ in 0..200 {
                let delay = backoff_delay(&policy, attempt, &mut rng);
                let floor = Duration::from_millis(1_000 * 2u64.pow(attempt));
                let ceiling = floor + Duration::from_millis(500);
                assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
                assert!(delay < ceiling, "attempt {attempt}: {delay:?} >= {ceiling:?}");
            }
        }
    }

    #[test]
    fn test_zero_jitter_gives_exact_base_delay() {
        // StepRng(0, 0) always yields 0, so the sampled jitter is 0
        let mut rng = StepRng::new(0, 0);
        let delay = backoff_delay(&policy(3, 100, 3.0), 2, &mut rng);
        assert_eq!(delay, Duration::from_millis(900));
    }

    #[test]
    fn test_zero_base_delay_never_waits() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            backoff_delay(&policy(3, 0, 2.0), 2, &mut rng),
            Duration::ZERO
        );
    }

    #[test]
    fn test_schedule_yields_max_retry_delays() {
        let schedule = BackoffSchedule::with_rng(policy(3, 10, 2.0), StdRng::seed_from_u64(3));
        assert_eq!(schedule.size_hint(), (3, Some(3)));
        let delays: Vec<_> = schedule.collect();
        assert_eq!(delays.len(), 3);
        assert!(delays[0] >= Duration::from_millis(10));
        assert!(delays[1] >= Duration::from_millis(20));
        assert!(delays[2] >= Duration::from_millis(40));
    }

    #[test]
    fn test_schedule_is_empty_without_retries() {
        assert_eq!(BackoffSchedule::new(policy(0, 10, 2.0)).count(), 0);
    }
}
