//! Retry policy for transient model failures.

use std::time::Duration;

use rand::Rng;

/// Capped geometric backoff with randomized jitter.
///
/// Jitter spreads retries from callers that failed at the same instant, so
/// tenants sharing a throttled backend do not stampede it in lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt ceiling, including the first attempt.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of the delay randomized in both directions, `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after a failed `attempt` (1-based), with jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return raw;
        }
        let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
        let jittered = Duration::from_secs_f64(raw.as_secs_f64() * factor);
        jittered.min(self.max_delay)
    }

    /// Undithered delay: `base * multiplier^(attempt-1)`, capped.
    fn raw_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as i32;
        let ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exp);
        let capped = ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(1_000),
            jitter,
        }
    }

    #[test]
    fn test_delays_grow_geometrically_without_jitter() {
        let p = policy(0.0);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
        assert_eq!(p.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let p = policy(0.0);
        assert_eq!(p.backoff(5), Duration::from_millis(1_000));
        assert_eq!(p.backoff(30), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let p = policy(0.5);
        for _ in 0..200 {
            let d = p.backoff(2);
            // raw is 200ms; 50% jitter allows 100..=300ms.
            assert!(d >= Duration::from_millis(100), "{d:?} below jitter floor");
            assert!(d <= Duration::from_millis(300), "{d:?} above jitter ceiling");
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let p = policy(1.0);
        for _ in 0..200 {
            assert!(p.backoff(10) <= p.max_delay);
        }
    }
}
