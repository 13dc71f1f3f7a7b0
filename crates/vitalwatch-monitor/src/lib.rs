//! # VitalWatch Monitor
//!
//! Continuous patient vital-sign monitoring with baseline-relative anomaly
//! detection and tiered alerting.
//!
//! ## Features
//!
//! - **Per-patient monitoring loop**: one cooperative task per patient polls
//!   its sensors, persists readings and sleeps until the next cycle
//! - **Baselines**: per-patient, per-signal means recomputed from history
//! - **Anomaly detection**: relative deviation from the baseline, or fixed
//!   guideline ranges when no baseline exists
//! - **Decisions**: a pluggable predictive model can alert, tighten
//!   monitoring or recommend an intervention
//! - **Tiered alerting**: every alert is recorded before anyone is notified
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   MonitoringSupervisor                   │
//! │   ┌──────────────┐ ┌───────────────┐ ┌───────────────┐   │
//! │   │  Detection   │ │   Decision    │ │   Alerting    │   │
//! │   │ baseline +   │ │ engine +      │ │ dispatcher +  │   │
//! │   │ anomaly      │ │ model         │ │ notifier      │   │
//! │   └──────┬───────┘ └──────┬────────┘ └──────┬────────┘   │
//! │          └────────────────┼─────────────────┘            │
//! │                 ┌─────────▼─────────┐                    │
//! │                 │    Integration    │                    │
//! │                 │ devices + stores  │                    │
//! │                 └───────────────────┘                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitalwatch_monitor::{
//!     InMemoryPatientDirectory, MonitorConfig, MonitoringSupervisor, Patient, PatientId,
//!     SimulatedDevice,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let patient = Patient::new(PatientId::new(), "Jane Doe", 54, "FEMALE");
//!     let directory = Arc::new(InMemoryPatientDirectory::with_patients(vec![patient]));
//!
//!     let supervisor = MonitoringSupervisor::builder(MonitorConfig::default())
//!         .patient_directory(directory)
//!         .device(Arc::new(SimulatedDevice::new("hr-1", "Heart Rate Monitor", 72.0)))
//!         .build()?;
//!
//!     supervisor.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     supervisor.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod alerting;
pub mod config;
pub mod decision;
pub mod detection;
pub mod domain;
pub mod integration;
pub mod monitoring;

pub use domain::{
    Alert, AlertId, AlertSource, AlertStatus, Baseline, BaselineOutcome, Decision, DecisionType,
    EmergencyContact, Medication, Patient, PatientId, Severity, SignalType, VitalReading,
};

pub use detection::{
    AnomalyConfig, AnomalyDetector, Basis, BaselineConfig, BaselineTracker, Evaluation,
    GuidelineRange, SeverityBreakpoints, TrendAnalyzer, TrendSummary,
};

pub use decision::{
    AnomalySummary, DecisionConfig, DecisionContext, DecisionEngine, ModelError, ModelInput,
    ModelOutput, PredictiveModel, RuleBasedModel,
};

pub use alerting::{
    AlertDispatcher, DispatchConfig, DispatchOutcome, Notifier, NotifyError, TracingNotifier,
};

pub use integration::{
    AlertStore, DeviceError, InMemoryAlertStore, InMemoryPatientDirectory, InMemoryReadingStore,
    PatientDirectory, ReadingStore, SensorDevice, SimulatedDevice, StoreError,
};

pub use monitoring::{CycleReport, MonitorEvent, MonitoringSupervisor, SupervisorBuilder, SupervisorState};

pub use config::{ConfigError, MonitorConfig, MonitorConfigBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Unified error type for monitor operations
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Sensor device error
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Store or directory error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Predictive model error
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Notification error
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An urgent alert could not be recorded and was not notified
    #[error("Escalation: {severity} alert {alert_id} for patient {patient_id} was not recorded: {source}")]
    Escalation {
        /// Alert that was lost
        alert_id: AlertId,
        /// Patient concerned
        patient_id: PatientId,
        /// Alert severity
        severity: Severity,
        /// Store failure
        source: StoreError,
    },

    /// Operation not allowed in the supervisor's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Alert, AlertDispatcher, AlertSource, AlertStatus, AnomalyDetector, BaselineTracker,
        Decision, DecisionType, MonitorConfig, MonitorError, MonitorEvent, MonitoringSupervisor,
        Patient, PatientId, Result, Severity, SignalType, SupervisorState, VitalReading,
    };
}
