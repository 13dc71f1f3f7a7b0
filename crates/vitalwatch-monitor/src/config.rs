//! Monitor configuration.
//!
//! [`MonitorConfig`] aggregates the per-component configs and can be built in
//! code through [`MonitorConfigBuilder`] or loaded from a JSON file. Every
//! duration is stored in milliseconds so files stay plain numbers.
//!
//! ```rust
//! use vitalwatch_monitor::MonitorConfig;
//!
//! let config = MonitorConfig::builder()
//!     .monitoring_interval_ms(2_000)
//!     .max_concurrent_patients(4)
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerting::DispatchConfig;
use crate::decision::DecisionConfig;
use crate::detection::{AnomalyConfig, BaselineConfig};

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A configuration file could not be read
    #[error("Cannot read config file `{path}`: {source}")]
    FileRead {
        /// Path being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be written
    #[error("Cannot write config file `{path}`: {source}")]
    FileWrite {
        /// Path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON for this schema
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause between cycles for each patient (milliseconds)
    pub monitoring_interval_ms: u64,
    /// Pause used after an `adjust_monitoring` decision (milliseconds)
    pub adjusted_interval_ms: u64,
    /// Upper bound on one device read (milliseconds)
    pub device_read_timeout_ms: u64,
    /// Patient tasks allowed to run at once
    pub max_concurrent_patients: usize,
    /// Readings held per patient while the reading store is failing
    pub retry_buffer_capacity: usize,
    /// Readings older than this are purged (days)
    pub retention_days: u32,
    /// Pause between purge runs (milliseconds)
    pub purge_interval_ms: u64,
    /// Buffered monitor events per subscriber
    pub event_capacity: usize,
    /// Baseline settings
    pub baseline: BaselineConfig,
    /// Anomaly detection settings
    pub anomaly: AnomalyConfig,
    /// Decision engine settings
    pub decision: DecisionConfig,
    /// Alert dispatch settings
    pub dispatch: DispatchConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_ms: 5_000,
            adjusted_interval_ms: 1_000,
            device_read_timeout_ms: 2_000,
            max_concurrent_patients: 10,
            retry_buffer_capacity: 1024,
            retention_days: 30,
            purge_interval_ms: 24 * 60 * 60 * 1000,
            event_capacity: 256,
            baseline: BaselineConfig::default(),
            anomaly: AnomalyConfig::default(),
            decision: DecisionConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration builder
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Default cycle interval
    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms)
    }

    /// Interval after an `adjust_monitoring` decision
    pub fn adjusted_interval(&self) -> Duration {
        Duration::from_millis(self.adjusted_interval_ms)
    }

    /// Per-read device timeout
    pub fn device_read_timeout(&self) -> Duration {
        Duration::from_millis(self.device_read_timeout_ms)
    }

    /// Interval between purge runs
    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms)
    }

    /// Check every field, including the nested configs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("monitoring_interval_ms", self.monitoring_interval_ms),
            ("adjusted_interval_ms", self.adjusted_interval_ms),
            ("device_read_timeout_ms", self.device_read_timeout_ms),
            ("purge_interval_ms", self.purge_interval_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be > 0")));
            }
        }
        if self.max_concurrent_patients == 0 {
            return Err(ConfigError::Invalid("max_concurrent_patients must be > 0".into()));
        }
        if self.retry_buffer_capacity == 0 {
            return Err(ConfigError::Invalid("retry_buffer_capacity must be > 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be > 0".into()));
        }

        self.baseline.validate()?;
        self.anomaly.validate()?;
        self.decision.validate()?;
        self.dispatch.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Builder for [`MonitorConfig`]
#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Set the default cycle interval
    pub fn monitoring_interval_ms(mut self, interval: u64) -> Self {
        self.config.monitoring_interval_ms = interval.max(1);
        self
    }

    /// Set the interval used after `adjust_monitoring`
    pub fn adjusted_interval_ms(mut self, interval: u64) -> Self {
        self.config.adjusted_interval_ms = interval.max(1);
        self
    }

    /// Set the per-read device timeout
    pub fn device_read_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.device_read_timeout_ms = timeout.max(1);
        self
    }

    /// Set how many patient tasks may run at once
    pub fn max_concurrent_patients(mut self, max: usize) -> Self {
        self.config.max_concurrent_patients = max.max(1);
        self
    }

    /// Set the per-patient retry buffer size
    pub fn retry_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.retry_buffer_capacity = capacity.max(1);
        self
    }

    /// Set reading retention
    pub fn retention_days(mut self, days: u32) -> Self {
        self.config.retention_days = days;
        self
    }

    /// Set the purge interval
    pub fn purge_interval_ms(mut self, interval: u64) -> Self {
        self.config.purge_interval_ms = interval.max(1);
        self
    }

    /// Set baseline settings
    pub fn baseline(mut self, baseline: BaselineConfig) -> Self {
        self.config.baseline = baseline;
        self
    }

    /// Set anomaly detection settings
    pub fn anomaly(mut self, anomaly: AnomalyConfig) -> Self {
        self.config.anomaly = anomaly;
        self
    }

    /// Set decision engine settings
    pub fn decision(mut self, decision: DecisionConfig) -> Self {
        self.config.decision = decision;
        self
    }

    /// Set dispatch settings
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    /// Build the configuration
    pub fn build(self) -> MonitorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::SeverityBreakpoints;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitoring_interval(), Duration::from_secs(5));
        assert_eq!(config.device_read_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_concurrent_patients, 10);
        assert_eq!(config.baseline.lookback_minutes, 10_080);
    }

    #[test]
    fn test_builder_clamps() {
        let config = MonitorConfig::builder()
            .monitoring_interval_ms(0)
            .max_concurrent_patients(0)
            .retention_days(7)
            .build();
        assert_eq!(config.monitoring_interval_ms, 1);
        assert_eq!(config.max_concurrent_patients, 1);
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("vitalwatch.json");

        let config = MonitorConfig::builder().monitoring_interval_ms(750).build();
        config.to_json(&path).unwrap();

        let loaded = MonitorConfig::from_json(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MonitorConfig::from_json_str(r#"{"monitoring_interval_ms": 250, "anomaly": {"deviation_threshold": 0.3}}"#)
            .unwrap();
        assert_eq!(config.monitoring_interval_ms, 250);
        assert_eq!(config.adjusted_interval_ms, 1_000);
        assert!((config.anomaly.deviation_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.anomaly.guidelines.len(), 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            MonitorConfig::from_json_str(r#"{"device_read_timeout_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(MonitorConfig::from_json_str("{not json"), Err(ConfigError::Parse(_))));

        let mut config = MonitorConfig::default();
        config.anomaly.baseline_breakpoints = SeverityBreakpoints::new(0.5, 0.4, 0.6);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = MonitorConfig::from_json(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
