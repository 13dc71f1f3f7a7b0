//! Per-patient, per-signal baseline tracking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::{Baseline, BaselineOutcome, PatientId, SignalType};
use crate::integration::{ReadingStore, StoreError};

/// Configuration for baseline computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// History considered when computing a baseline (minutes)
    pub lookback_minutes: u64,
    /// How often each patient's baselines are recomputed (milliseconds)
    pub refresh_interval_ms: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 10_080, // one week
            refresh_interval_ms: 24 * 60 * 60 * 1000,
        }
    }
}

impl BaselineConfig {
    /// Refresh interval as a duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_minutes == 0 {
            return Err(ConfigError::Invalid("lookback_minutes must be > 0".into()));
        }
        Ok(())
    }
}

/// Maintains the current baseline for every (patient, signal type) pair.
///
/// Entries live in a sharded map so concurrent patient tasks never contend
/// on a global lock. Each key is replaced wholesale on recomputation.
pub struct BaselineTracker {
    config: BaselineConfig,
    store: Arc<dyn ReadingStore>,
    baselines: DashMap<(PatientId, SignalType), Baseline>,
    last_refresh: DashMap<PatientId, DateTime<Utc>>,
}

impl BaselineTracker {
    /// Create a tracker reading history from `store`
    pub fn new(config: BaselineConfig, store: Arc<dyn ReadingStore>) -> Self {
        Self {
            config,
            store,
            baselines: DashMap::new(),
            last_refresh: DashMap::new(),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Recompute the baseline for one patient and signal type.
    ///
    /// Readings the store returns for any other patient or type are ignored.
    /// With no usable history the entry is removed and `NoBaseline` returned.
    pub async fn compute_baseline(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
    ) -> Result<BaselineOutcome, StoreError> {
        let history = self
            .store
            .query_by_patient_and_type(patient_id, signal_type, self.config.lookback_minutes)
            .await?;

        let values: Vec<f64> = history
            .iter()
            .filter(|r| r.matches(patient_id, signal_type))
            .map(|r| r.value())
            .filter(|v| v.is_finite())
            .collect();

        let key = (patient_id.clone(), signal_type);
        if values.is_empty() {
            self.baselines.remove(&key);
            return Ok(BaselineOutcome::NoBaseline);
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let baseline = Baseline::new(patient_id.clone(), signal_type, mean, values.len());
        self.baselines.insert(key, baseline.clone());

        tracing::debug!(
            patient_id = %patient_id,
            signal = %signal_type,
            value = mean,
            samples = values.len(),
            "Baseline updated"
        );

        Ok(BaselineOutcome::Established(baseline))
    }

    /// Recompute every signal type for a patient and record the refresh time.
    ///
    /// Returns the number of baselines established. On a store failure the
    /// refresh time is left untouched so the next cycle tries again.
    pub async fn refresh_patient(&self, patient_id: &PatientId) -> Result<usize, StoreError> {
        let mut established = 0;
        for signal_type in SignalType::ALL {
            if self.compute_baseline(patient_id, signal_type).await?.is_established() {
                established += 1;
            }
        }
        self.last_refresh.insert(patient_id.clone(), Utc::now());
        Ok(established)
    }

    /// Whether the periodic refresh is due; always true before the first refresh
    pub fn is_refresh_due(&self, patient_id: &PatientId, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_refresh.get(patient_id).map(|entry| *entry) else {
            return true;
        };
        match (now - last).to_std() {
            Ok(elapsed) => elapsed >= self.config.refresh_interval(),
            // Clock went backwards
            Err(_) => false,
        }
    }

    /// Current baseline for a key
    pub fn baseline(&self, patient_id: &PatientId, signal_type: SignalType) -> Option<Baseline> {
        self.baselines
            .get(&(patient_id.clone(), signal_type))
            .map(|entry| entry.value().clone())
    }

    /// Every current baseline for a patient
    pub fn baselines_for(&self, patient_id: &PatientId) -> Vec<Baseline> {
        SignalType::ALL
            .iter()
            .filter_map(|signal| self.baseline(patient_id, *signal))
            .collect()
    }

    /// Number of tracked baselines
    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    /// Whether no baseline is tracked
    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}
