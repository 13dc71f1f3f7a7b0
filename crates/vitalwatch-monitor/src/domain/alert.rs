//! Alert types for care-staff notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PatientId, VitalReading};

/// Unique identifier for an alert
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Create a new random alert ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alert severity levels, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, recorded only
    Low,
    /// Needs attention through the standard channel
    Medium,
    /// Urgent attention needed
    High,
    /// Immediate action required
    Critical,
}

impl Severity {
    /// Whether alerts of this severity go through the urgent path
    pub fn is_urgent(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }

    /// Parse a severity name as produced by a predictive model
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

/// Status of an alert in the care workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Awaiting acknowledgement
    Pending,
    /// Seen by care staff
    Acknowledged,
    /// Closed after intervention
    Resolved,
    /// Closed as a false alarm
    FalseAlarm,
}

impl AlertStatus {
    /// Whether the workflow allows moving from `self` to `next`.
    ///
    /// Resolved and false-alarm are terminal.
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (self, next),
            (Pending, Acknowledged)
                | (Pending, Resolved)
                | (Pending, FalseAlarm)
                | (Acknowledged, Resolved)
                | (Acknowledged, FalseAlarm)
        )
    }

    /// Whether the alert is closed
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::FalseAlarm)
    }
}

/// Component that raised the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSource {
    /// Raised by baseline/guideline anomaly detection
    Detector,
    /// Raised by a decision of type `alert`
    DecisionEngine,
}

/// An alert for care staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    id: AlertId,
    patient_id: PatientId,
    severity: Severity,
    message: String,
    triggering_reading: Option<VitalReading>,
    status: AlertStatus,
    source: AlertSource,
    created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new pending alert
    pub fn new(
        patient_id: PatientId,
        severity: Severity,
        message: impl Into<String>,
        triggering_reading: Option<VitalReading>,
        source: AlertSource,
    ) -> Self {
        Self {
            id: AlertId::new(),
            patient_id,
            severity,
            message: message.into(),
            triggering_reading,
            status: AlertStatus::Pending,
            source,
            created_at: Utc::now(),
        }
    }

    /// Get the alert ID
    pub fn id(&self) -> &AlertId {
        &self.id
    }

    /// Get the patient ID
    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    /// Get the severity
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Reading that triggered the alert
    pub fn triggering_reading(&self) -> Option<&VitalReading> {
        self.triggering_reading.as_ref()
    }

    /// Get the status
    pub fn status(&self) -> AlertStatus {
        self.status
    }

    /// Get the source
    pub fn source(&self) -> AlertSource {
        self.source
    }

    /// Get creation time
    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    /// Check if alert is pending
    pub fn is_pending(&self) -> bool {
        self.status == AlertStatus::Pending
    }

    /// Move to a new status, returning `false` if the transition is not allowed
    pub fn transition(&mut self, next: AlertStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Time since alert was created
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
