//! Configuration loading and validation for Tidegate.
//!
//! Loads a TOML file into [`TidegateConfig`], applying documented defaults
//! for every omitted field and validating ranges at load time. Converters
//! produce the runtime types the resilience and context crates consume.
//!
//! ```toml
//! [resilience.breaker]
//! failure_threshold = 5
//! open_timeout_secs = 60
//!
//! [resilience.retry]
//! max_attempts = 3
//! base_delay_ms = 4000
//! max_delay_ms = 10000
//! multiplier = 2.0
//! jitter_fraction = 0.1
//!
//! [context]
//! budget = 4096
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidegate_resilience::{BreakerConfig, RetryPolicy};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidegateConfig {
    /// Retry and circuit-breaker settings.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Context assembly settings.
    #[serde(default)]
    pub context: ContextConfig,
}

/// Settings for the fault-tolerant call wrapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Circuit-breaker thresholds.
    #[serde(default)]
    pub breaker: BreakerSettings,

    /// Retry backoff schedule.
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Circuit-breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures that trip the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admitting a probe.
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,
}

/// Retry backoff schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the exponential delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential growth factor.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter half-width as a fraction of the delay.
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

/// Context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total capacity budget for an assembled context.
    #[serde(default = "default_budget")]
    pub budget: u64,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_open_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    4000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_jitter_fraction() -> f64 {
    0.1
}
fn default_budget() -> u64 {
    4096
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_timeout_secs: default_open_timeout_secs(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
        }
    }
}

impl TidegateConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a present file must parse and
    /// validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content, path)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every configured range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let breaker = &self.resilience.breaker;
        if breaker.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.failure_threshold must be >= 1".into(),
            ));
        }

        let retry = &self.resilience.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be >= 1".into(),
            ));
        }
        if retry.multiplier <= 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.multiplier must be > 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&retry.jitter_fraction) {
            return Err(ConfigError::ValidationError(
                "retry.jitter_fraction must be in [0, 1)".into(),
            ));
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.max_delay_ms must be >= retry.base_delay_ms".into(),
            ));
        }

        Ok(())
    }

    /// The breaker configuration for a [`BreakerRegistry`].
    ///
    /// [`BreakerRegistry`]: tidegate_resilience::BreakerRegistry
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.resilience.breaker.failure_threshold,
            open_timeout: Duration::from_secs(self.resilience.breaker.open_timeout_secs),
        }
    }

    /// The retry policy for a [`ResilientInvoker`].
    ///
    /// [`ResilientInvoker`]: tidegate_resilience::ResilientInvoker
    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.resilience.retry;
        RetryPolicy {
            max_attempts: retry.max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            multiplier: retry.multiplier,
            jitter_fraction: retry.jitter_fraction,
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
