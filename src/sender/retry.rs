use rand::Rng;
use std::time::Duration;

/// Backoff policy for retryable per-record forwards.
///
/// `max_attempts` counts every try including the first. Delays double per
/// retry starting from `base_delay`, capped at `max_delay`, with optional
/// jitter to spread simultaneous retries apart.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `retry_index` (zero-based: the first retry waits
    /// the base delay).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let multiplier = 2_u64.pow(retry_index.min(16));
        let delay =
            Duration::from_millis((self.base_delay.as_millis() as u64).saturating_mul(multiplier));
        let capped = std::cmp::min(delay, self.max_delay);

        if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor = rng.random_range(0.5..1.5); // ±50% jitter
    let jittered_millis = (delay.as_millis() as f64 * jitter_factor) as u64;
    Duration::from_millis(jittered_millis)
}
