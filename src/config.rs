//! Timing configuration for waits and retries.
//!
//! A [`WaitConfig`] is passed to every waiter explicitly. Providers usually
//! build one from their configuration block with
//! [`WaitConfig::from_provider_config`]:
//!
//! ```
//! use hemmer_resource_waiter::WaitConfig;
//! use serde_json::json;
//!
//! let config = WaitConfig::from_provider_config(&json!({
//!     "region": "eu-west-2",
//!     "poll_interval_seconds": 5,
//!     "timeout_seconds": 900,
//! }))
//! .unwrap();
//!
//! assert_eq!(config.poll_interval.as_secs(), 5);
//! assert_eq!(config.timeout.as_secs(), 900);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WaitError;

/// Default delay between two reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default overall time allowed for a wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Longest accepted interval, timeout or initial delay.
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Timing parameters for a single wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Delay between two consecutive reads.
    pub poll_interval: Duration,
    /// Overall time allowed, measured from the start of the wait.
    pub timeout: Duration,
    /// Delay before the first read.
    pub initial_delay: Duration,
    /// Consecutive "not found" reads tolerated before failing.
    pub not_found_checks: u32,
    /// Consecutive target-state reads required before succeeding.
    pub target_occurrences: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            initial_delay: Duration::ZERO,
            not_found_checks: 0,
            target_occurrences: 1,
        }
    }
}

impl WaitConfig {
    /// Create a configuration with the given interval and timeout.
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
            ..Default::default()
        }
    }

    /// Set the delay between reads.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay before the first read.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Tolerate up to `checks` consecutive "not found" reads.
    ///
    /// Useful right after a create call, when the platform's read API may
    /// lag behind its write API.
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Require `occurrences` consecutive target-state reads.
    pub fn with_target_occurrences(mut self, occurrences: u32) -> Self {
        self.target_occurrences = occurrences;
        self
    }

    /// Check that the configuration can drive a wait.
    pub fn validate(&self) -> Result<(), WaitError> {
        if self.poll_interval.is_zero() {
            return Err(WaitError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(WaitError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let durations = [
            ("poll interval", self.poll_interval),
            ("timeout", self.timeout),
            ("initial delay", self.initial_delay),
        ];
        for (name, duration) in durations {
            if duration > MAX_DURATION {
                return Err(WaitError::Configuration(format!(
                    "{} of {}s exceeds the maximum of {}s",
                    name,
                    duration.as_secs(),
                    MAX_DURATION.as_secs()
                )));
            }
        }
        if self.target_occurrences == 0 {
            return Err(WaitError::Configuration(
                "target occurrences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a configuration from a provider configuration block.
    ///
    /// Missing keys fall back to the defaults and unrelated keys are ignored.
    /// A null configuration yields the defaults.
    pub fn from_provider_config(config: &serde_json::Value) -> Result<Self, WaitError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        let raw: RawWaitConfig = serde_json::from_value(config.clone())
            .map_err(|e| WaitError::Configuration(format!("invalid wait settings: {}", e)))?;
        let config = Self::from(raw);
        config.validate()?;
        Ok(config)
    }
}

/// The serialized form of [`WaitConfig`], in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWaitConfig {
    /// Delay between reads, in seconds.
    pub poll_interval_seconds: u64,
    /// Overall timeout, in seconds.
    pub timeout_seconds: u64,
    /// Delay before the first read, in seconds.
    pub initial_delay_seconds: u64,
    /// Consecutive "not found" reads tolerated.
    pub not_found_checks: u32,
    /// Consecutive target-state reads required.
    pub target_occurrences: u32,
}

impl Default for RawWaitConfig {
    fn default() -> Self {
        WaitConfig::default().into()
    }
}

impl From<RawWaitConfig> for WaitConfig {
    fn from(raw: RawWaitConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(raw.poll_interval_seconds),
            timeout: Duration::from_secs(raw.timeout_seconds),
            initial_delay: Duration::from_secs(raw.initial_delay_seconds),
            not_found_checks: raw.not_found_checks,
            target_occurrences: raw.target_occurrences,
        }
    }
}

impl From<WaitConfig> for RawWaitConfig {
    fn from(config: WaitConfig) -> Self {
        Self {
            poll_interval_seconds: config.poll_interval.as_secs(),
            timeout_seconds: config.timeout.as_secs(),
            initial_delay_seconds: config.initial_delay.as_secs(),
            not_found_checks: config.not_found_checks,
            target_occurrences: config.target_occurrences,
        }
    }
}
