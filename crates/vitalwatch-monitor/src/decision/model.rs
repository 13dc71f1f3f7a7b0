//! Predictive model interface and the rule-based reference model.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::detection::Basis;
use crate::domain::{Medication, PatientId, Severity, SignalType, VitalReading};

/// Errors raised by predictive models
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model could not be consulted
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// The model answered with something that is not a decision
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// The model does not implement this operation
    #[error("Operation not supported by model: {0}")]
    Unsupported(String),
}

/// Result type for model operations
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// One anomaly observed in the current cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    /// Signal the anomaly was found on
    pub signal_type: SignalType,
    /// Offending value
    pub value: f64,
    /// Assigned severity
    pub severity: Severity,
    /// Deviation or excursion magnitude
    pub magnitude: f64,
    /// Rule that flagged it
    pub basis: Basis,
}

/// Everything the model sees for one decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInput {
    /// Patient identifier
    pub patient_id: PatientId,
    /// Age in years
    pub age: u32,
    /// Recorded gender
    pub gender: String,
    /// Additional demographic attributes
    pub demographics: HashMap<String, String>,
    /// Free-text medical history
    pub medical_history: String,
    /// Active medications
    pub current_medications: Vec<Medication>,
    /// Readings in the recent window
    pub recent_readings: Vec<VitalReading>,
    /// Anomalies detected this cycle
    pub anomalies: Vec<AnomalySummary>,
    /// Anomalous readings across the recent window
    pub recent_anomaly_count: usize,
    /// Free-form context supplied by the caller
    pub context: HashMap<String, String>,
}

/// Opaque model answer.
///
/// Expected shape: `{"decision_type": .., "description": .., "confidence": ..,
/// "severity": ..}` with `severity` optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelOutput(Value);

impl ModelOutput {
    /// Wrap a JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Underlying JSON
    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

/// A model that turns patient context into a decision
#[async_trait]
pub trait PredictiveModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Produce a decision for one patient
    async fn predict(&self, input: &ModelInput) -> ModelResult<ModelOutput>;

    /// Train on historical inputs
    async fn train(&self, _samples: &[ModelInput]) -> ModelResult<()> {
        Err(ModelError::Unsupported(format!("{} cannot be trained", self.name())))
    }

    /// Persist model state
    async fn save(&self, _path: &Path) -> ModelResult<()> {
        Err(ModelError::Unsupported(format!("{} cannot be saved", self.name())))
    }

    /// Restore model state
    async fn load(&self, _path: &Path) -> ModelResult<()> {
        Err(ModelError::Unsupported(format!("{} cannot be loaded", self.name())))
    }
}

/// Threshold rules over the anomalies in the input.
///
/// Checked in order: any high or critical anomaly raises an alert; at least
/// `intervention_threshold` anomalies across the recent window recommends an
/// intervention; any other anomaly this cycle tightens monitoring.
#[derive(Debug, Clone)]
pub struct RuleBasedModel {
    intervention_threshold: usize,
}

impl Default for RuleBasedModel {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RuleBasedModel {
    /// Create a model with the given intervention threshold
    pub fn new(intervention_threshold: usize) -> Self {
        Self {
            intervention_threshold: intervention_threshold.max(1),
        }
    }
}

#[async_trait]
impl PredictiveModel for RuleBasedModel {
    fn name(&self) -> &str {
        "rule-based"
    }

    async fn predict(&self, input: &ModelInput) -> ModelResult<ModelOutput> {
        let worst = input.anomalies.iter().max_by_key(|a| a.severity);

        let output = match worst {
            Some(anomaly) if anomaly.severity.is_urgent() => json!({
                "decision_type": "alert",
                "description": format!(
                    "{} anomaly on {} ({:.1})",
                    anomaly.severity,
                    anomaly.signal_type.label(),
                    anomaly.value
                ),
                "confidence": 0.9,
                "severity": anomaly.severity,
            }),
            _ if input.recent_anomaly_count >= self.intervention_threshold => json!({
                "decision_type": "recommend_intervention",
                "description": format!(
                    "{} anomalous readings in the recent window",
                    input.recent_anomaly_count
                ),
                "confidence": 0.7,
            }),
            Some(anomaly) => json!({
                "decision_type": "adjust_monitoring",
                "description": format!("Increase monitoring after {} anomaly", anomaly.signal_type.label()),
                "confidence": 0.6,
            }),
            None => json!({
                "decision_type": "no_action",
                "description": "Vitals within expected range",
                "confidence": 0.8,
            }),
        };

        Ok(ModelOutput::new(output))
    }
}
