//! Runtime configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors from [`Config::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is outside its accepted range.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Environment variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Optimistic write retries
    pub retry: RetryConfig,
    /// Recurrence scheduler
    pub scheduler: SchedulerConfig,
}

/// Retry configuration for the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first (default: 4)
    pub max_attempts: usize,
    /// Delay after the first conflict in milliseconds (default: 25)
    pub initial_delay_ms: u64,
    /// Cap on the delay in milliseconds (default: 1000)
    pub max_delay_ms: u64,
    /// Growth factor between delays (default: 2.0)
    pub multiplier: f64,
    /// Randomize delays (default: true)
    pub jitter: bool,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler loop runs at all (default: true)
    pub enabled: bool,
    /// Seconds between generation passes (default: 3600)
    pub period_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 4,
                initial_delay_ms: 25,
                max_delay_ms: 1000,
                multiplier: 2.0,
                jitter: true,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                period_secs: 3600,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Missing or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            retry: RetryConfig {
                max_attempts: parse_var("ATTENDANCE_RETRY_MAX_ATTEMPTS")
                    .unwrap_or(defaults.retry.max_attempts),
                initial_delay_ms: parse_var("ATTENDANCE_RETRY_INITIAL_DELAY_MS")
                    .unwrap_or(defaults.retry.initial_delay_ms),
                max_delay_ms: parse_var("ATTENDANCE_RETRY_MAX_DELAY_MS")
                    .unwrap_or(defaults.retry.max_delay_ms),
                multiplier: parse_var("ATTENDANCE_RETRY_MULTIPLIER")
                    .unwrap_or(defaults.retry.multiplier),
                jitter: parse_var("ATTENDANCE_RETRY_JITTER").unwrap_or(defaults.retry.jitter),
            },
            scheduler: SchedulerConfig {
                enabled: parse_var("ATTENDANCE_SCHEDULER_ENABLED")
                    .unwrap_or(defaults.scheduler.enabled),
                period_secs: parse_var("ATTENDANCE_SCHEDULER_PERIOD_SECS")
                    .unwrap_or(defaults.scheduler.period_secs),
            },
        }
    }

    /// Reject values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10).contains(&self.retry.max_attempts) {
            return Err(ConfigError::Invalid {
                name: "ATTENDANCE_RETRY_MAX_ATTEMPTS",
                reason: format!("must be between 1 and 10, got {}", self.retry.max_attempts),
            });
        }
        if self.retry.multiplier < 1.0 || !self.retry.multiplier.is_finite() {
            return Err(ConfigError::Invalid {
                name: "ATTENDANCE_RETRY_MULTIPLIER",
                reason: format!("must be a finite value >= 1.0, got {}", self.retry.multiplier),
            });
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::Invalid {
                name: "ATTENDANCE_RETRY_MAX_DELAY_MS",
                reason: format!(
                    "must not be below the initial delay ({}ms), got {}ms",
                    self.retry.initial_delay_ms, self.retry.max_delay_ms
                ),
            });
        }
        if self.scheduler.period_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "ATTENDANCE_SCHEDULER_PERIOD_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Backoff policy described by the retry settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .multiplier(self.retry.multiplier)
            .jitter(self.retry.jitter)
            .build()
    }

    /// Time between scheduler passes, or `None` when the scheduler is disabled.
    #[must_use]
    pub const fn scheduler_period(&self) -> Option<Duration> {
        if self.scheduler.enabled {
            Some(Duration::from_secs(self.scheduler.period_secs))
        } else {
            None
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.retry_policy().max_attempts, 4);
        assert_eq!(config.scheduler_period(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn disabled_scheduler_has_no_period() {
        let mut config = Config::default();
        config.scheduler.enabled = false;
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.scheduler_period(), None);
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "ATTENDANCE_RETRY_MAX_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn rejects_cap_below_initial_delay() {
        let mut config = Config::default();
        config.retry.initial_delay_ms = 500;
        config.retry.max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_period() {
        let mut config = Config::default();
        config.scheduler.period_secs = 0;
        assert!(config.validate().is_err());
    }
}
