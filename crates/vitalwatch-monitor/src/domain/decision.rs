//! Decisions produced by the decision engine within one cycle.

use serde::{Deserialize, Serialize};

use super::Severity;

/// Kind of action a decision calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Raise an alert to care staff
    Alert,
    /// Change the monitoring cadence
    AdjustMonitoring,
    /// Recommend a clinical intervention
    RecommendIntervention,
    /// Continue normal monitoring
    NoAction,
}

impl DecisionType {
    /// Parse a decision type as emitted by a predictive model.
    ///
    /// Accepts snake_case and SCREAMING_SNAKE_CASE spellings.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "alert" => Some(DecisionType::Alert),
            "adjust_monitoring" => Some(DecisionType::AdjustMonitoring),
            "recommend_intervention" => Some(DecisionType::RecommendIntervention),
            "no_action" => Some(DecisionType::NoAction),
            _ => None,
        }
    }

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Alert => "alert",
            DecisionType::AdjustMonitoring => "adjust_monitoring",
            DecisionType::RecommendIntervention => "recommend_intervention",
            DecisionType::NoAction => "no_action",
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed decision with a confidence in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    decision_type: DecisionType,
    description: String,
    confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity_hint: Option<Severity>,
}

impl Decision {
    /// Create a decision, clamping confidence into `[0, 1]`
    pub fn new(decision_type: DecisionType, description: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            decision_type,
            description: description.into(),
            confidence,
            severity_hint: None,
        }
    }

    /// Attach the severity the model suggests for an alert decision
    pub fn with_severity_hint(mut self, severity: Option<Severity>) -> Self {
        self.severity_hint = severity;
        self
    }

    /// The fallback decision used when the model cannot be consulted
    pub fn no_action(description: impl Into<String>) -> Self {
        Self::new(DecisionType::NoAction, description, 0.0)
    }

    /// Decision type
    pub fn decision_type(&self) -> DecisionType {
        self.decision_type
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Confidence in `[0, 1]`
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Severity suggested by the model, if any
    pub fn severity_hint(&self) -> Option<Severity> {
        self.severity_hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_spellings() {
        assert_eq!(DecisionType::parse("NO_ACTION"), Some(DecisionType::NoAction));
        assert_eq!(DecisionType::parse("adjust_monitoring"), Some(DecisionType::AdjustMonitoring));
        assert_eq!(DecisionType::parse("escalate"), None);
    }

    #[test]
    fn confidence_is_clamped() {
        assert!((Decision::new(DecisionType::Alert, "x", 1.7).confidence() - 1.0).abs() < f64::EPSILON);
        assert!(Decision::new(DecisionType::Alert, "x", f64::NAN).confidence().abs() < f64::EPSILON);
    }
}
