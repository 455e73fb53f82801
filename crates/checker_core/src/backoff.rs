use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// Exponential backoff with an additive jitter and a hard ceiling.
///
/// The policy is stateless: callers keep the previous delay and feed it back
/// into [`BackoffPolicy::next_delay`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,
    pub growth_factor: f64,
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter added to a delay.
    #[serde(with = "duration_ms")]
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            growth_factor: 2.0,
            max_delay: Duration::from_secs(45),
            max_jitter: Duration::from_millis(1_000),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based).
    ///
    /// The first retry waits `initial_delay`; every later one grows the
    /// previous delay by `growth_factor`. The result is whole milliseconds and
    /// never exceeds `max_delay`.
    pub fn next_delay(&self, attempt: u32, previous: Duration, jitter: Duration) -> Duration {
        let cap_ms = self.max_delay.as_millis() as f64;
        let base_ms = if attempt <= 1 {
            self.initial_delay.as_millis() as f64
        } else {
            previous.as_millis() as f64 * self.growth_factor.max(1.0)
        };
        let millis = (base_ms + jitter.as_millis() as f64).min(cap_ms).max(0.0);
        Duration::from_millis(millis.round() as u64)
    }

    /// Draws a jitter uniformly from `[0, max_jitter]`.
    pub fn sample_jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}
