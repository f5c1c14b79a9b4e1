//! Existence index configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use username_index::domain::IndexConfigBuilder;
//!
//! let config = IndexConfigBuilder::new()
//!     .target_fpr(0.01)
//!     .minimum_capacity(50_000)
//!     .fallback_timeout(Duration::from_millis(500))
//!     .build()?;
//! ```

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Existence index configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Target false positive rate for every filter the service builds
    pub target_fpr: f64,
    /// Floor for the capacity of the initial and reset filters
    pub minimum_capacity: usize,
    /// Saturation above which a rebuild is scheduled
    pub rebuild_threshold: f64,
    /// Population-to-capacity ratio a rebuilt filter aims for
    pub target_load_factor: f64,
    /// Bound on a single authoritative `exists` lookup
    pub fallback_timeout: Duration,
    /// Bound on a full streaming scan (initialize or rebuild)
    pub scan_timeout: Duration,
    /// Longest accepted username, in bytes after normalization
    pub max_username_len: usize,
    /// Attempts per background rebuild before giving up
    pub rebuild_max_attempts: u32,
    /// First retry delay for a failed background rebuild
    pub rebuild_backoff_base: Duration,
    /// Retry delay cap
    pub rebuild_backoff_max: Duration,
    /// Periodic rebuild interval, disabled when `None`
    pub rebuild_interval: Option<Duration>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            target_fpr: 0.01,
            minimum_capacity: 10_000,
            rebuild_threshold: 0.75,
            target_load_factor: 0.5,
            fallback_timeout: Duration::from_secs(2),
            scan_timeout: Duration::from_secs(300),
            max_username_len: 64,
            rebuild_max_attempts: 5,
            rebuild_backoff_base: Duration::from_millis(500),
            rebuild_backoff_max: Duration::from_secs(30),
            rebuild_interval: None,
        }
    }
}

impl IndexConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `UI_TARGET_FPR` (default: 0.01)
    /// - `UI_MINIMUM_CAPACITY` (default: 10000)
    /// - `UI_REBUILD_THRESHOLD` (default: 0.75)
    /// - `UI_TARGET_LOAD_FACTOR` (default: 0.5)
    /// - `UI_FALLBACK_TIMEOUT_MS` (default: 2000)
    /// - `UI_SCAN_TIMEOUT_MS` (default: 300000)
    /// - `UI_MAX_USERNAME_LEN` (default: 64)
    /// - `UI_REBUILD_MAX_ATTEMPTS` (default: 5)
    /// - `UI_REBUILD_BACKOFF_MS` (default: 500)
    /// - `UI_REBUILD_INTERVAL_SECS` (default: unset)
    ///
    /// Unparseable values fall back to the default. Call [`IndexConfig::validate`]
    /// on the result.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            target_fpr: env_parse("UI_TARGET_FPR").unwrap_or(defaults.target_fpr),
            minimum_capacity: env_parse("UI_MINIMUM_CAPACITY")
                .unwrap_or(defaults.minimum_capacity),
            rebuild_threshold: env_parse("UI_REBUILD_THRESHOLD")
                .unwrap_or(defaults.rebuild_threshold),
            target_load_factor: env_parse("UI_TARGET_LOAD_FACTOR")
                .unwrap_or(defaults.target_load_factor),
            fallback_timeout: env_parse("UI_FALLBACK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.fallback_timeout),
            scan_timeout: env_parse("UI_SCAN_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.scan_timeout),
            max_username_len: env_parse("UI_MAX_USERNAME_LEN")
                .unwrap_or(defaults.max_username_len),
            rebuild_max_attempts: env_parse("UI_REBUILD_MAX_ATTEMPTS")
                .unwrap_or(defaults.rebuild_max_attempts),
            rebuild_backoff_base: env_parse("UI_REBUILD_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.rebuild_backoff_base),
            rebuild_backoff_max: defaults.rebuild_backoff_max,
            rebuild_interval: env_parse("UI_REBUILD_INTERVAL_SECS").map(Duration::from_secs),
        }
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), IndexError> {
        if !(self.target_fpr > 0.0 && self.target_fpr < 1.0) {
            return Err(IndexError::InvalidConfig(format!(
                "target_fpr must be in (0, 1), got {}",
                self.target_fpr
            )));
        }

        if self.minimum_capacity == 0 {
            return Err(IndexError::InvalidConfig(
                "minimum_capacity cannot be 0".to_string(),
            ));
        }

        if !(self.rebuild_threshold > 0.0 && self.rebuild_threshold <= 1.0) {
            return Err(IndexError::InvalidConfig(format!(
                "rebuild_threshold must be in (0, 1], got {}",
                self.rebuild_threshold
            )));
        }

        if !(self.target_load_factor > 0.0 && self.target_load_factor <= 1.0) {
            return Err(IndexError::InvalidConfig(format!(
                "target_load_factor must be in (0, 1], got {}",
                self.target_load_factor
            )));
        }

        if self.fallback_timeout.is_zero() || self.scan_timeout.is_zero() {
            return Err(IndexError::InvalidConfig(
                "timeouts must be non-zero".to_string(),
            ));
        }

        if self.max_username_len == 0 {
            return Err(IndexError::InvalidConfig(
                "max_username_len cannot be 0".to_string(),
            ));
        }

        if self.rebuild_max_attempts == 0 {
            return Err(IndexError::InvalidConfig(
                "rebuild_max_attempts must be at least 1".to_string(),
            ));
        }

        if self.rebuild_backoff_base.is_zero() || self.rebuild_backoff_max < self.rebuild_backoff_base
        {
            return Err(IndexError::InvalidConfig(
                "rebuild backoff must satisfy 0 < base <= max".to_string(),
            ));
        }

        if matches!(self.rebuild_interval, Some(d) if d.is_zero()) {
            return Err(IndexError::InvalidConfig(
                "rebuild_interval cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.rebuild_backoff_base
            .saturating_mul(factor)
            .min(self.rebuild_backoff_max)
    }

    pub fn with_target_fpr(mut self, fpr: f64) -> Self {
        self.target_fpr = fpr;
        self
    }

    pub fn with_minimum_capacity(mut self, capacity: usize) -> Self {
        self.minimum_capacity = capacity;
        self
    }

    pub fn with_rebuild_threshold(mut self, threshold: f64) -> Self {
        self.rebuild_threshold = threshold;
        self
    }

    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for [`IndexConfig`] with validation
#[derive(Default)]
pub struct IndexConfigBuilder {
    target_fpr: Option<f64>,
    minimum_capacity: Option<usize>,
    rebuild_threshold: Option<f64>,
    target_load_factor: Option<f64>,
    fallback_timeout: Option<Duration>,
    scan_timeout: Option<Duration>,
    max_username_len: Option<usize>,
    rebuild_max_attempts: Option<u32>,
    rebuild_backoff_base: Option<Duration>,
    rebuild_backoff_max: Option<Duration>,
    rebuild_interval: Option<Duration>,
}

impl IndexConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_fpr(mut self, fpr: f64) -> Self {
        self.target_fpr = Some(fpr);
        self
    }

    pub fn minimum_capacity(mut self, capacity: usize) -> Self {
        self.minimum_capacity = Some(capacity);
        self
    }

    pub fn rebuild_threshold(mut self, threshold: f64) -> Self {
        self.rebuild_threshold = Some(threshold);
        self
    }

    pub fn target_load_factor(mut self, factor: f64) -> Self {
        self.target_load_factor = Some(factor);
        self
    }

    pub fn fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = Some(timeout);
        self
    }

    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = Some(timeout);
        self
    }

    pub fn max_username_len(mut self, len: usize) -> Self {
        self.max_username_len = Some(len);
        self
    }

    pub fn rebuild_max_attempts(mut self, attempts: u32) -> Self {
        self.rebuild_max_attempts = Some(attempts);
        self
    }

    pub fn rebuild_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.rebuild_backoff_base = Some(base);
        self.rebuild_backoff_max = Some(max);
        self
    }

    pub fn rebuild_interval(mut self, interval: Duration) -> Self {
        self.rebuild_interval = Some(interval);
        self
    }

    /// Build the config, validating all parameters
    pub fn build(self) -> Result<IndexConfig, IndexError> {
        let defaults = IndexConfig::default();

        let config = IndexConfig {
            target_fpr: self.target_fpr.unwrap_or(defaults.target_fpr),
            minimum_capacity: self.minimum_capacity.unwrap_or(defaults.minimum_capacity),
            rebuild_threshold: self.rebuild_threshold.unwrap_or(defaults.rebuild_threshold),
            target_load_factor: self
                .target_load_factor
                .unwrap_or(defaults.target_load_factor),
            fallback_timeout: self.fallback_timeout.unwrap_or(defaults.fallback_timeout),
            scan_timeout: self.scan_timeout.unwrap_or(defaults.scan_timeout),
            max_username_len: self.max_username_len.unwrap_or(defaults.max_username_len),
            rebuild_max_attempts: self
                .rebuild_max_attempts
                .unwrap_or(defaults.rebuild_max_attempts),
            rebuild_backoff_base: self
                .rebuild_backoff_base
                .unwrap_or(defaults.rebuild_backoff_base),
            rebuild_backoff_max: self
                .rebuild_backoff_max
                .unwrap_or(defaults.rebuild_backoff_max),
            rebuild_interval: self.rebuild_interval.or(defaults.rebuild_interval),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_fpr, 0.01);
        assert_eq!(config.rebuild_threshold, 0.75);
    }

    #[test]
    fn test_rejects_out_of_range_fpr() {
        for fpr in [0.0, 1.0, -0.5, f64::NAN] {
            let config = IndexConfig::default().with_target_fpr(fpr);
            assert!(
                matches!(config.validate(), Err(IndexError::InvalidConfig(_))),
                "fpr {} should be rejected",
                fpr
            );
        }
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = IndexConfig::default().with_minimum_capacity(0);
        assert!(matches!(config.validate(), Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = IndexConfig::default().with_rebuild_threshold(1.5);
        assert!(matches!(config.validate(), Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = IndexConfig::default().with_fallback_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_creates_valid_config() {
        let config = IndexConfigBuilder::new()
            .target_fpr(0.001)
            .minimum_capacity(1000)
            .rebuild_threshold(0.9)
            .fallback_timeout(Duration::from_millis(250))
            .rebuild_interval(Duration::from_secs(3600))
            .build()
            .expect("Should create valid config");

        assert_eq!(config.target_fpr, 0.001);
        assert_eq!(config.minimum_capacity, 1000);
        assert_eq!(config.rebuild_threshold, 0.9);
        assert_eq!(config.fallback_timeout, Duration::from_millis(250));
        assert_eq!(config.rebuild_interval, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_builder_uses_defaults() {
        let config = IndexConfigBuilder::new().build().unwrap();
        let defaults = IndexConfig::default();
        assert_eq!(config.minimum_capacity, defaults.minimum_capacity);
        assert_eq!(config.scan_timeout, defaults.scan_timeout);
    }

    #[test]
    fn test_builder_rejects_inverted_backoff() {
        let result = IndexConfigBuilder::new()
            .rebuild_backoff(Duration::from_secs(10), Duration::from_secs(1))
            .build();
        assert!(matches!(result, Err(IndexError::InvalidConfig(_))));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = IndexConfigBuilder::new()
            .rebuild_backoff(Duration::from_millis(100), Duration::from_millis(1000))
            .build()
            .unwrap();

        assert_eq!(config.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(800));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_config_serializes() {
        let config = IndexConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: IndexConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.minimum_capacity, config.minimum_capacity);
        assert_eq!(back.fallback_timeout, config.fallback_timeout);
    }
}
