//! Pipeline configuration.
//!
//! Retry, timeout and staleness knobs are passed to the processors explicitly so
//! tests can run with short deadlines.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

pub const ENV_MAX_RETRIES: &str = "LINGOFORGE_MAX_RETRIES";
pub const ENV_GENERATION_TIMEOUT_SECS: &str = "LINGOFORGE_GENERATION_TIMEOUT_SECS";
pub const ENV_BATCH_LIMIT: &str = "LINGOFORGE_BATCH_LIMIT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Failed attempts before a job or target becomes terminal.
    pub max_retries: u32,

    /// Deadline for a single generation call, in both processors.
    #[serde(rename = "generation_timeout_secs", with = "duration_secs")]
    pub generation_timeout: Duration,

    /// A `generating` target older than this is considered abandoned.
    #[serde(rename = "staleness_window_secs", with = "duration_secs")]
    pub staleness_window: Duration,

    /// Upper bound on `generate_next` calls made by one `generate_all`.
    pub max_group_attempts: u32,

    /// Pause after each successful generation in `generate_all`.
    #[serde(rename = "inter_generation_delay_secs", with = "duration_secs")]
    pub inter_generation_delay: Duration,

    /// Default batch size for the trigger surface.
    pub batch_limit: usize,

    /// Distance between consecutive items' target dates on enqueue.
    #[serde(rename = "job_spacing_secs", with = "duration_secs")]
    pub job_spacing: Duration,

    /// Terminal jobs last processed before `now - retention` are purged by cleanup.
    #[serde(rename = "retention_secs", with = "duration_secs")]
    pub retention: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            generation_timeout: Duration::from_secs(90),
            staleness_window: Duration::from_secs(2 * 60),
            max_group_attempts: 50,
            inter_generation_delay: Duration::from_secs(1),
            batch_limit: 10,
            job_spacing: Duration::from_secs(24 * 60 * 60),
            retention: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_inter_generation_delay(mut self, delay: Duration) -> Self {
        self.inter_generation_delay = delay;
        self
    }

    /// Apply `LINGOFORGE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = parse(ENV_MAX_RETRIES, &v)?;
        }
        if let Some(v) = lookup(ENV_GENERATION_TIMEOUT_SECS) {
            self.generation_timeout = Duration::from_secs(parse(ENV_GENERATION_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = lookup(ENV_BATCH_LIMIT) {
            self.batch_limit = parse(ENV_BATCH_LIMIT, &v)?;
        }
        Ok(self)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
