//! Per-patient, per-signal reference values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PatientId, SignalType};

/// Reference value for one (patient, signal type) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    patient_id: PatientId,
    signal_type: SignalType,
    value: f64,
    sample_count: usize,
    last_computed_at: DateTime<Utc>,
}

impl Baseline {
    /// Create a baseline computed now
    pub fn new(patient_id: PatientId, signal_type: SignalType, value: f64, sample_count: usize) -> Self {
        Self {
            patient_id,
            signal_type,
            value,
            sample_count,
            last_computed_at: Utc::now(),
        }
    }

    /// Patient the baseline belongs to
    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    /// Signal type the baseline describes
    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    /// Baseline value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Number of readings the value was derived from
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// When the baseline was computed
    pub fn last_computed_at(&self) -> &DateTime<Utc> {
        &self.last_computed_at
    }
}

/// Result of a baseline computation.
///
/// `NoBaseline` is distinct from a baseline of zero.
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineOutcome {
    /// A baseline was derived from history
    Established(Baseline),
    /// No readings were available in the lookback window
    NoBaseline,
}

impl BaselineOutcome {
    /// The baseline, if one was established
    pub fn baseline(&self) -> Option<&Baseline> {
        match self {
            BaselineOutcome::Established(b) => Some(b),
            BaselineOutcome::NoBaseline => None,
        }
    }

    /// Whether a baseline was established
    pub fn is_established(&self) -> bool {
        matches!(self, BaselineOutcome::Established(_))
    }
}
