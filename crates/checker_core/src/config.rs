use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::BackoffPolicy;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RESULTS_CAP: usize = 150;
pub const DEFAULT_INFO_CAP: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("max_retries must be at least 1")]
    ZeroRetries,
    #[error("probe_timeout must be greater than zero")]
    ZeroTimeout,
    #[error("backoff growth_factor must be a finite number >= 1, got {0}")]
    InvalidGrowthFactor(String),
    #[error("backoff max_delay ({max:?}) is shorter than initial_delay ({initial:?})")]
    DelayCeilingBelowInitial { initial: Duration, max: Duration },
    #[error("{0} log cap must be at least 1")]
    ZeroLogCap(&'static str),
}

/// Tunables for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of probes in flight at once.
    pub concurrency: usize,
    /// Number of probe attempts before a record is classified as an error.
    pub max_retries: u32,
    #[serde(with = "duration_ms")]
    pub probe_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// Jitter non-rate-limit retries as well.
    pub jitter_transient: bool,
    /// Treat an unparsable success body as transient instead of terminal.
    pub retry_malformed: bool,
    pub results_cap: usize,
    pub info_cap: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            probe_timeout: Duration::from_secs(20),
            backoff: BackoffPolicy::default(),
            jitter_transient: false,
            retry_malformed: false,
            results_cap: DEFAULT_RESULTS_CAP,
            info_cap: DEFAULT_INFO_CAP,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        let factor = self.backoff.growth_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::InvalidGrowthFactor(factor.to_string()));
        }
        if self.backoff.max_delay < self.backoff.initial_delay {
            return Err(ConfigError::DelayCeilingBelowInitial {
                initial: self.backoff.initial_delay,
                max: self.backoff.max_delay,
            });
        }
        if self.results_cap == 0 {
            return Err(ConfigError::ZeroLogCap("results"));
        }
        if self.info_cap == 0 {
            return Err(ConfigError::ZeroLogCap("info"));
        }
        Ok(())
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
