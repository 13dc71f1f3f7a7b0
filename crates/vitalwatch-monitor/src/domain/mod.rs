//! Domain model for patient monitoring.
//!
//! Entities here are plain data: readings are immutable once created,
//! baselines are superseded rather than merged, and alerts only ever change
//! status.

pub mod alert;
pub mod baseline;
pub mod decision;
pub mod patient;
pub mod reading;

pub use alert::{Alert, AlertId, AlertSource, AlertStatus, Severity};
pub use baseline::{Baseline, BaselineOutcome};
pub use decision::{Decision, DecisionType};
pub use patient::{EmergencyContact, Medication, Patient, PatientId};
pub use reading::{SignalType, VitalReading};
