//! Engine configuration
//!
//! Tunables shared by every experiment handled by an engine instance.
//! Per-experiment knobs (split, sample size, confidence level) live in
//! [`crate::experiment::ExperimentConfig`] instead.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Minimum impressions each group needs before a z-test is attempted.
pub const DEFAULT_MIN_SAMPLES_PER_GROUP: u64 = 30;

/// Default cap on a single user's event log.
pub const DEFAULT_MAX_EVENTS_PER_USER: usize = 100;

/// Tolerance used when checking that traffic shares sum to 100.
pub const DEFAULT_SPLIT_TOLERANCE: f64 = 1e-6;

/// Which critical value sizes the confidence interval's margin of error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPolicy {
    /// Use the critical value of the experiment's configured confidence level.
    #[default]
    MatchConfidenceLevel,
    /// Always use 1.96, whatever level the experiment is configured with.
    Fixed95,
}

/// Engine-wide configuration.
///
/// ## Example
///
/// ```rust
/// use trueno_ab::config::{EngineConfig, IntervalPolicy};
///
/// let config = EngineConfig::from_json(r#"{ "max_events_per_user": 20 }"#).unwrap();
/// assert_eq!(config.max_events_per_user, 20);
/// assert_eq!(config.min_samples_per_group, 30);
/// assert_eq!(config.interval_policy, IntervalPolicy::MatchConfidenceLevel);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Impressions required in both control and treatment before analysis.
    pub min_samples_per_group: u64,
    /// Maximum events retained per assigned user; oldest are dropped first.
    pub max_events_per_user: usize,
    /// Critical value policy for confidence intervals.
    pub interval_policy: IntervalPolicy,
    /// Store per-day snapshots in the results on completion.
    pub collect_daily_snapshots: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_samples_per_group: DEFAULT_MIN_SAMPLES_PER_GROUP,
            max_events_per_user: DEFAULT_MAX_EVENTS_PER_USER,
            interval_policy: IntervalPolicy::default(),
            collect_daily_snapshots: true,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the per-group sample floor.
    #[must_use]
    pub const fn with_min_samples_per_group(mut self, samples: u64) -> Self {
        self.min_samples_per_group = samples;
        self
    }

    /// Set the per-user event log cap.
    #[must_use]
    pub const fn with_max_events_per_user(mut self, max_events: usize) -> Self {
        self.max_events_per_user = max_events;
        self
    }

    /// Set the confidence interval policy.
    #[must_use]
    pub const fn with_interval_policy(mut self, policy: IntervalPolicy) -> Self {
        self.interval_policy = policy;
        self
    }

    /// Enable or disable daily snapshots on completion.
    #[must_use]
    pub const fn with_daily_snapshots(mut self, enabled: bool) -> Self {
        self.collect_daily_snapshots = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.min_samples_per_group, 30);
        assert_eq!(config.max_events_per_user, 100);
        assert!(config.collect_daily_snapshots);
    }

    #[test]
    fn test_config_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"interval_policy": "fixed95"}"#).unwrap();
        assert_eq!(config.interval_policy, IntervalPolicy::Fixed95);
        assert_eq!(config.max_events_per_user, DEFAULT_MAX_EVENTS_PER_USER);
    }

    #[test]
    fn test_config_from_json_malformed() {
        assert!(EngineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_min_samples_per_group(100)
            .with_max_events_per_user(5)
            .with_daily_snapshots(false);
        assert_eq!(config.min_samples_per_group, 100);
        assert_eq!(config.max_events_per_user, 5);
        assert!(!config.collect_daily_snapshots);
    }
}
