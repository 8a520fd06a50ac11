//! Pipeline configuration with environment overrides.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ValidationError;
use crate::retry::{Backoff, RetryConfig};
use crate::scheduler::SchedulerConfig;
use crate::unit::DEFAULT_CACHE_MINUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Doubles the delay per attempt, with jitter, up to `max_delay_ms`.
    pub exponential: bool,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retry_attempts: 2,
            retry_delay_ms: 500,
            exponential: false,
            max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_duration_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Applied to units built from this configuration.
    pub default_minutes: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_minutes: DEFAULT_CACHE_MINUTES,
        }
    }
}

/// Everything needed to assemble a send pipeline and drive a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
    pub cache: CacheSettings,
    pub scheduler: SchedulerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 3_000,
            retry: RetrySettings::default(),
            breaker: BreakerSettings::default(),
            cache: CacheSettings::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `SENDKIT_*` environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::default().overlay(|name| env::var(name).ok())
    }

    /// Applies overrides from `lookup`, then validates.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `SENDKIT_BASE_URL` | `base_url` |
    /// | `SENDKIT_TIMEOUT_MS` | `timeout_ms` |
    /// | `SENDKIT_MAX_RETRIES` | `retry.max_retry_attempts` |
    /// | `SENDKIT_RETRY_DELAY_MS` | `retry.retry_delay_ms` |
    /// | `SENDKIT_RETRY_EXPONENTIAL` | `retry.exponential` |
    /// | `SENDKIT_BREAKER_THRESHOLD` | `breaker.failure_threshold` |
    /// | `SENDKIT_BREAKER_OPEN_SECS` | `breaker.open_duration_secs` |
    /// | `SENDKIT_CACHE_ENABLED` | `cache.enabled` |
    /// | `SENDKIT_CACHE_MINUTES` | `cache.default_minutes` |
    /// | `SENDKIT_MAX_TASKS` | `scheduler.max_task_count` |
    /// | `SENDKIT_MAX_CONCURRENCY` | `scheduler.max_concurrency` |
    pub fn overlay(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ValidationError> {
        if let Some(base_url) = lookup("SENDKIT_BASE_URL").filter(|value| !value.trim().is_empty()) {
            self.base_url = Some(base_url.trim().to_string());
        }
        override_parsed(&lookup, "SENDKIT_TIMEOUT_MS", &mut self.timeout_ms)?;
        override_parsed(&lookup, "SENDKIT_MAX_RETRIES", &mut self.retry.max_retry_attempts)?;
        override_parsed(&lookup, "SENDKIT_RETRY_DELAY_MS", &mut self.retry.retry_delay_ms)?;
        override_parsed(&lookup, "SENDKIT_RETRY_EXPONENTIAL", &mut self.retry.exponential)?;
        override_parsed(&lookup, "SENDKIT_BREAKER_THRESHOLD", &mut self.breaker.failure_threshold)?;
        override_parsed(&lookup, "SENDKIT_BREAKER_OPEN_SECS", &mut self.breaker.open_duration_secs)?;
        override_parsed(&lookup, "SENDKIT_CACHE_ENABLED", &mut self.cache.enabled)?;
        override_parsed(&lookup, "SENDKIT_CACHE_MINUTES", &mut self.cache.default_minutes)?;
        override_parsed(&lookup, "SENDKIT_MAX_TASKS", &mut self.scheduler.max_task_count)?;
        override_parsed(&lookup, "SENDKIT_MAX_CONCURRENCY", &mut self.scheduler.max_concurrency)?;

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(base_url) = &self.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(ValidationError::InvalidBaseUrl {
                    value: base_url.clone(),
                });
            }
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        self.breaker_config().validate()?;
        self.scheduler.validate()
    }

    pub fn retry_config(&self) -> RetryConfig {
        let delay = Duration::from_millis(self.retry.retry_delay_ms);
        let backoff = if self.retry.exponential {
            Backoff::Exponential {
                base: delay,
                factor: 2.0,
                max: Duration::from_millis(self.retry.max_delay_ms.max(self.retry.retry_delay_ms)),
                jitter: true,
            }
        } else {
            Backoff::Fixed { delay }
        };

        RetryConfig {
            max_retry_attempts: self.retry.max_retry_attempts,
            backoff,
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            open_duration: Duration::from_secs(self.breaker.open_duration_secs),
        }
    }
}

fn override_parsed<V: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    target: &mut V,
) -> Result<(), ValidationError> {
    let Some(raw) = lookup(name) else {
        return Ok(());
    };

    *target = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidEnvValue { name, value: raw })?;
    Ok(())
}
