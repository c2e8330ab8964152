//! Per-callable measurement configuration and logging policy

use crate::error::GuardResult;
use serde::{Deserialize, Serialize};

/// How thresholds gate the measurement log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogPolicy {
    /// Log every tracked metric unless a threshold is set and not exceeded.
    #[default]
    Measure,
    /// Only metrics with a threshold are tracked, and they are logged only
    /// when the threshold is exceeded.
    Monitor,
}

/// Configuration bound to one wrapped callable.
///
/// Thresholds are expressed in whatever unit is active when the measurement
/// completes (see [`UnitSettings`](crate::UnitSettings)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementConfig {
    /// Label prefixed to every record for this callable.
    pub name: Option<String>,

    /// Capture elapsed time.
    #[serde(alias = "elapsed")]
    pub measure_elapsed: bool,

    /// Capture the resident memory delta.
    #[serde(alias = "memory")]
    pub measure_memory: bool,

    /// Elapsed-time threshold in the active time unit.
    #[serde(alias = "logTimeLimit", alias = "elapsedLimit")]
    pub elapsed_threshold: Option<f64>,

    /// Memory threshold in the active memory unit.
    #[serde(alias = "logMemoryLimit")]
    pub memory_threshold: Option<f64>,

    /// Threshold semantics.
    pub policy: LogPolicy,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            name: None,
            measure_elapsed: true,
            measure_memory: false,
            elapsed_threshold: None,
            memory_threshold: None,
            policy: LogPolicy::Measure,
        }
    }
}

impl MeasurementConfig {
    /// Measure-style defaults: elapsed time on, memory off, no thresholds.
    pub fn measure() -> Self {
        Self::default()
    }

    /// Monitor-style config with no thresholds yet.
    ///
    /// Nothing is tracked until a threshold is added.
    pub fn monitor() -> Self {
        Self {
            policy: LogPolicy::Monitor,
            ..Self::default()
        }
    }

    /// Parse a config from JSON, accepting the legacy option names.
    pub fn from_json(json: &str) -> GuardResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder method to set the record label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder method to toggle elapsed-time capture.
    pub fn with_elapsed(mut self, enabled: bool) -> Self {
        self.measure_elapsed = enabled;
        self
    }

    /// Builder method to toggle memory capture.
    pub fn with_memory(mut self, enabled: bool) -> Self {
        self.measure_memory = enabled;
        self
    }

    /// Builder method to set the elapsed-time threshold.
    pub fn with_elapsed_threshold(mut self, threshold: f64) -> Self {
        self.elapsed_threshold = Some(threshold);
        self
    }

    /// Builder method to set the memory threshold.
    pub fn with_memory_threshold(mut self, threshold: f64) -> Self {
        self.memory_threshold = Some(threshold);
        self
    }

    /// Builder method to pick the threshold semantics.
    pub fn with_policy(mut self, policy: LogPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether elapsed time is captured at all for this config.
    pub fn tracks_elapsed(&self) -> bool {
        match self.policy {
            LogPolicy::Measure => self.measure_elapsed,
            LogPolicy::Monitor => self.elapsed_threshold.is_some(),
        }
    }

    /// Whether the memory probe is consulted for this config.
    pub fn tracks_memory(&self) -> bool {
        match self.policy {
            LogPolicy::Measure => self.measure_memory,
            LogPolicy::Monitor => self.memory_threshold.is_some(),
        }
    }

    /// Whether nothing is captured, so calls skip snapshotting entirely.
    pub fn is_passthrough(&self) -> bool {
        !self.tracks_elapsed() && !self.tracks_memory()
    }

    /// Check whether a converted elapsed value should be logged.
    pub fn should_log_elapsed(&self, elapsed: f64) -> bool {
        self.tracks_elapsed() && self.passes(self.elapsed_threshold, elapsed)
    }

    /// Check whether a converted memory value should be logged.
    pub fn should_log_memory(&self, memory: f64) -> bool {
        self.tracks_memory() && self.passes(self.memory_threshold, memory)
    }

    fn passes(&self, threshold: Option<f64>, value: f64) -> bool {
        match threshold {
            Some(limit) => value > limit,
            None => self.policy == LogPolicy::Measure,
        }
    }

    /// Record prefix, `"{name} - "` or empty.
    pub(crate) fn prefix(&self) -> String {
        match &self.name {
            Some(name) => format!("{} - ", name),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_defaults() {
        let config = MeasurementConfig::measure();
        assert!(config.tracks_elapsed());
        assert!(!config.tracks_memory());
        assert!(config.should_log_elapsed(0.0));
        assert!(!config.is_passthrough());
    }

    #[test]
    fn test_measure_threshold_is_strict() {
        let config = MeasurementConfig::measure().with_elapsed_threshold(200.0);
        assert!(!config.should_log_elapsed(50.0));
        assert!(!config.should_log_elapsed(200.0));
        assert!(config.should_log_elapsed(200.5));
    }

    #[test]
    fn test_monitor_without_threshold_tracks_nothing() {
        let config = MeasurementConfig::monitor().with_elapsed(true).with_memory(true);
        assert!(!config.tracks_elapsed());
        assert!(!config.tracks_memory());
        assert!(config.is_passthrough());
        assert!(!config.should_log_elapsed(1.0e9));
    }

    #[test]
    fn test_monitor_with_thresholds() {
        let config = MeasurementConfig::monitor()
            .with_elapsed_threshold(200.0)
            .with_memory_threshold(1024.0);
        assert!(config.tracks_elapsed());
        assert!(config.tracks_memory());
        assert!(!config.should_log_elapsed(50.0));
        assert!(config.should_log_elapsed(300.0));
        assert!(!config.should_log_memory(512.0));
        assert!(config.should_log_memory(4096.0));
    }

    #[test]
    fn test_disabled_metric_never_logs() {
        let config = MeasurementConfig::measure().with_elapsed(false);
        assert!(!config.should_log_elapsed(1.0e9));
        assert!(config.is_passthrough());
    }

    #[test]
    fn test_prefix() {
        assert_eq!(MeasurementConfig::measure().prefix(), "");
        assert_eq!(MeasurementConfig::measure().with_name("load").prefix(), "load - ");
    }

    #[test]
    fn test_from_json_accepts_legacy_names() {
        let config = MeasurementConfig::from_json(
            r#"{"name": "io", "memory": true, "logTimeLimit": 250, "logMemoryLimit": 2.5, "policy": "monitor"}"#,
        )
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("io"));
        assert!(config.measure_memory);
        assert!(config.measure_elapsed);
        assert_eq!(config.elapsed_threshold, Some(250.0));
        assert_eq!(config.memory_threshold, Some(2.5));
        assert_eq!(config.policy, LogPolicy::Monitor);

        let config = MeasurementConfig::from_json(r#"{"measureElapsed": false}"#).unwrap();
        assert!(!config.measure_elapsed);
        assert_eq!(config.policy, LogPolicy::Measure);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = MeasurementConfig::monitor()
            .with_name("job")
            .with_elapsed_threshold(10.0);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"elapsedThreshold\":10.0"));
        let parsed: MeasurementConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
