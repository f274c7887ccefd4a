//! Monitor configuration

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`DriftMonitor`](crate::drift::DriftMonitor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum number of observations kept in the rolling window
    pub window_capacity: usize,

    /// Observations required before an evaluation is attempted
    pub min_samples_for_evaluation: usize,

    /// Threshold on the overall (max) drift score
    pub global_drift_threshold: f64,

    /// Per-feature overrides of the drift threshold
    pub per_feature_thresholds: HashMap<String, f64>,

    /// Observations since the last reset that trigger retraining
    pub volume_trigger_count: u64,

    /// Age of the reference that triggers retraining
    #[serde(with = "duration_secs")]
    pub staleness_interval: Duration,

    /// Interval between scheduled evaluations
    #[serde(with = "duration_secs")]
    pub evaluation_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_capacity: 1000,
            min_samples_for_evaluation: 30,
            global_drift_threshold: 0.3,
            per_feature_thresholds: HashMap::new(),
            volume_trigger_count: 1000,
            staleness_interval: Duration::from_secs(24 * 60 * 60),
            evaluation_interval: Duration::from_secs(300),
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window_capacity: env_parse("DRIFT_WINDOW_SIZE").unwrap_or(defaults.window_capacity),
            min_samples_for_evaluation: env_parse("DRIFT_MIN_SAMPLES")
                .unwrap_or(defaults.min_samples_for_evaluation),
            global_drift_threshold: env_parse("DRIFT_THRESHOLD")
                .unwrap_or(defaults.global_drift_threshold),
            per_feature_thresholds: defaults.per_feature_thresholds,
            volume_trigger_count: env_parse("RETRAIN_VOLUME_TRIGGER")
                .unwrap_or(defaults.volume_trigger_count),
            staleness_interval: env_parse("RETRAIN_STALENESS_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.staleness_interval),
            evaluation_interval: env_parse("CHECK_INTERVAL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.evaluation_interval),
        }
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the window capacity
    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    /// Builder method to set the minimum sample count
    pub fn with_min_samples(mut self, n: usize) -> Self {
        self.min_samples_for_evaluation = n;
        self
    }

    /// Builder method to set the global drift threshold
    pub fn with_global_threshold(mut self, threshold: f64) -> Self {
        self.global_drift_threshold = threshold;
        self
    }

    /// Builder method to override the threshold of a single feature
    pub fn with_feature_threshold(mut self, feature: impl Into<String>, threshold: f64) -> Self {
        self.per_feature_thresholds.insert(feature.into(), threshold);
        self
    }

    /// Builder method to set the volume trigger
    pub fn with_volume_trigger(mut self, count: u64) -> Self {
        self.volume_trigger_count = count;
        self
    }

    /// Builder method to set the staleness interval
    pub fn with_staleness_interval(mut self, interval: Duration) -> Self {
        self.staleness_interval = interval;
        self
    }

    /// Builder method to set the evaluation interval
    pub fn with_evaluation_interval(mut self, interval: Duration) -> Self {
        self.evaluation_interval = interval;
        self
    }

    /// Threshold that applies to `feature`
    pub fn threshold_for(&self, feature: &str) -> f64 {
        self.per_feature_thresholds
            .get(feature)
            .copied()
            .unwrap_or(self.global_drift_threshold)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(DriftError::ConfigError(
                "window_capacity must be at least 1".to_string(),
            ));
        }
        if self.min_samples_for_evaluation == 0 {
            return Err(DriftError::ConfigError(
                "min_samples_for_evaluation must be at least 1".to_string(),
            ));
        }
        if self.min_samples_for_evaluation > self.window_capacity {
            return Err(DriftError::ConfigError(format!(
                "min_samples_for_evaluation ({}) exceeds window_capacity ({})",
                self.min_samples_for_evaluation, self.window_capacity
            )));
        }
        check_threshold("global_drift_threshold", self.global_drift_threshold)?;
        for (feature, &threshold) in &self.per_feature_thresholds {
            check_threshold(feature, threshold)?;
        }
        if self.evaluation_interval.is_zero() {
            return Err(DriftError::ConfigError(
                "evaluation_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_threshold(name: &str, threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(DriftError::ConfigError(format!(
            "threshold for '{}' must be a finite non-negative number, got {}",
            name, threshold
        )));
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Serialize a `Duration` as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.window_capacity, 1000);
        assert_eq!(config.min_samples_for_evaluation, 30);
        assert!((config.global_drift_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.volume_trigger_count, 1000);
        assert_eq!(config.staleness_interval, Duration::from_secs(86_400));
        assert_eq!(config.evaluation_interval, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_feature_threshold_override() {
        let config = MonitorConfig::new()
            .with_global_threshold(0.5)
            .with_feature_threshold("temperature", 0.1);
        assert_eq!(config.threshold_for("temperature"), 0.1);
        assert_eq!(config.threshold_for("vibration"), 0.5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(MonitorConfig::new().with_window_capacity(0).validate().is_err());
        assert!(MonitorConfig::new().with_min_samples(0).validate().is_err());
        assert!(MonitorConfig::new()
            .with_window_capacity(10)
            .with_min_samples(20)
            .validate()
            .is_err());
        assert!(MonitorConfig::new().with_global_threshold(f64::NAN).validate().is_err());
        assert!(MonitorConfig::new()
            .with_feature_threshold("x", -1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_round_trip_uses_seconds() {
        let config = MonitorConfig::new().with_staleness_interval(Duration::from_secs(60));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["staleness_interval"], 60.0);

        let partial = r#"{"window_capacity": 200, "staleness_interval": 1.5}"#;
        let parsed: MonitorConfig = serde_json::from_str(partial).unwrap();
        assert_eq!(parsed.window_capacity, 200);
        assert_eq!(parsed.staleness_interval, Duration::from_millis(1500));
        assert_eq!(parsed.min_samples_for_evaluation, 30);
    }
}
