use std::time::Duration;

use rand::Rng;

/// Adaptive backoff between transport attempts.
///
/// Delays grow exponentially from `base` and are capped at `max`, with full
/// jitter. A server-provided `Retry-After` wins over the computed delay, and
/// throttled attempts wait the full ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            max: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>, throttled: bool) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max);
        }
        let ceiling = self.ceiling(attempt);
        if throttled || ceiling.is_zero() {
            return ceiling;
        }
        let millis = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }

    fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}
