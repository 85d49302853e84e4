//! Configuration for the worker pool.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the pool does after a chunk fails for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep dispatching; merge whatever succeeded.
    BestEffort,
    /// Stop dispatching, drain in-flight solves, end the run without merging.
    AbortOnFatal,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::AbortOnFatal => "abort_on_fatal",
        }
    }
}

/// Configuration for the worker pool.
///
/// `failure_policy` has no default: every run states it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum concurrent solves.
    #[serde(default = "default_max_processes")]
    pub max_processes: usize,

    pub failure_policy: FailurePolicy,

    /// Retry configuration for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl PoolConfig {
    pub fn new(max_processes: usize, failure_policy: FailurePolicy) -> Self {
        Self {
            max_processes,
            failure_policy,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per chunk, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_processes() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before re-dispatching after the given (1-based) failed attempt.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(4), Duration::from_millis(800));
        assert_eq!(config.delay_for(5), Duration::from_millis(1000));
    }

    #[test]
    fn test_failure_policy_is_required() {
        let err = toml::from_str::<PoolConfig>("max_processes = 2").unwrap_err();
        assert!(err.to_string().contains("failure_policy"));

        let config: PoolConfig =
            toml::from_str("max_processes = 2\nfailure_policy = \"abort_on_fatal\"").unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::AbortOnFatal);
        assert_eq!(config.retry.max_attempts, 3);
    }
}
