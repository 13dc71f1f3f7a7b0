//! Decision engine wrapping an injected predictive model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::model::{AnomalySummary, ModelError, ModelInput, ModelOutput, PredictiveModel};
use crate::config::ConfigError;
use crate::domain::{Decision, DecisionType, Patient, Severity, VitalReading};

/// Configuration for the decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Window of readings handed to the model (minutes)
    pub recent_window_minutes: u64,
    /// Upper bound on one model call (milliseconds)
    pub model_timeout_ms: u64,
    /// Anomalies across the window before the rule model recommends intervention
    pub intervention_threshold: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            recent_window_minutes: 60,
            model_timeout_ms: 5_000,
            intervention_threshold: 3,
        }
    }
}

impl DecisionConfig {
    /// Model timeout as a duration
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_window_minutes == 0 {
            return Err(ConfigError::Invalid("recent_window_minutes must be > 0".into()));
        }
        if self.model_timeout_ms == 0 {
            return Err(ConfigError::Invalid("model_timeout_ms must be > 0".into()));
        }
        if self.intervention_threshold == 0 {
            return Err(ConfigError::Invalid("intervention_threshold must be > 0".into()));
        }
        Ok(())
    }
}

/// Per-cycle facts the engine forwards to the model
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    /// Anomalies detected this cycle
    pub anomalies: Vec<AnomalySummary>,
    /// Anomalous readings across the recent window
    pub recent_anomaly_count: usize,
    /// Free-form attributes
    pub attributes: HashMap<String, String>,
}

impl DecisionContext {
    /// Highest severity among this cycle's anomalies
    pub fn highest_severity(&self) -> Option<Severity> {
        self.anomalies.iter().map(|a| a.severity).max()
    }
}

/// Turns recent readings and patient context into a [`Decision`]
pub struct DecisionEngine {
    config: DecisionConfig,
    model: Arc<dyn PredictiveModel>,
}

impl DecisionEngine {
    /// Create an engine around a model
    pub fn new(config: DecisionConfig, model: Arc<dyn PredictiveModel>) -> Self {
        Self { config, model }
    }

    /// Get configuration
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Assemble the model input for one patient
    pub fn build_input(
        &self,
        patient: &Patient,
        recent_readings: &[VitalReading],
        context: &DecisionContext,
    ) -> ModelInput {
        ModelInput {
            patient_id: patient.id.clone(),
            age: patient.age,
            gender: patient.gender.clone(),
            demographics: patient.demographics.clone(),
            medical_history: patient.medical_history.clone(),
            current_medications: patient.current_medications.clone(),
            recent_readings: recent_readings.to_vec(),
            anomalies: context.anomalies.clone(),
            recent_anomaly_count: context.recent_anomaly_count,
            context: context.attributes.clone(),
        }
    }

    /// Consult the model.
    ///
    /// Never fails: model errors, timeouts and malformed answers all yield
    /// `no_action` with a warning.
    pub async fn decide(
        &self,
        patient: &Patient,
        recent_readings: &[VitalReading],
        context: &DecisionContext,
    ) -> Decision {
        let input = self.build_input(patient, recent_readings, context);

        let output = match tokio::time::timeout(self.config.model_timeout(), self.model.predict(&input)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(patient_id = %patient.id, model = %self.model.name(), error = %e, "Model prediction failed");
                return Decision::no_action(format!("model error: {e}"));
            }
            Err(_) => {
                tracing::warn!(
                    patient_id = %patient.id,
                    model = %self.model.name(),
                    timeout_ms = self.config.model_timeout_ms,
                    "Model prediction timed out"
                );
                return Decision::no_action("model timed out");
            }
        };

        match translate(&output) {
            Ok(decision) => {
                tracing::debug!(
                    patient_id = %patient.id,
                    decision = %decision.decision_type(),
                    confidence = decision.confidence(),
                    "Decision made"
                );
                decision
            }
            Err(e) => {
                tracing::warn!(patient_id = %patient.id, error = %e, "Discarding model output");
                Decision::no_action(format!("malformed model output: {e}"))
            }
        }
    }
}

/// Convert raw model output into a typed decision
pub fn translate(output: &ModelOutput) -> Result<Decision, ModelError> {
    let object = output
        .as_json()
        .as_object()
        .ok_or_else(|| ModelError::MalformedOutput("expected a JSON object".into()))?;

    let raw_type = object
        .get("decision_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ModelError::MalformedOutput("missing decision_type".into()))?;
    let decision_type = DecisionType::parse(raw_type)
        .ok_or_else(|| ModelError::MalformedOutput(format!("unknown decision_type '{raw_type}'")))?;

    let confidence = object
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ModelError::MalformedOutput("missing confidence".into()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ModelError::MalformedOutput(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    let description = object
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| decision_type.as_str());

    let severity = object.get("severity").and_then(|v| v.as_str()).and_then(Severity::parse);

    Ok(Decision::new(decision_type, description, confidence).with_severity_hint(severity))
}
