//! Lifecycle states and events published by the supervisor.

use serde::{Deserialize, Serialize};

use crate::domain::{AlertId, AlertSource, Decision, PatientId, Severity};

/// Lifecycle of the supervisor and of each patient task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// Created, not started
    Idle,
    /// Cycling
    Running,
    /// Shutdown signalled, finishing the current cycle
    Stopping,
    /// Finished
    Stopped,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Running => "running",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Summary of one monitoring cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Readings taken from devices
    pub readings_collected: usize,
    /// Readings written to the store, retries included
    pub readings_persisted: usize,
    /// Readings still waiting for the store
    pub readings_queued: usize,
    /// Devices that failed or timed out
    pub device_failures: usize,
    /// Alerts accepted by the dispatcher
    pub alerts_dispatched: usize,
    /// Decision taken this cycle, if the engine ran
    pub decision: Option<Decision>,
    /// Pause before the patient's next cycle (milliseconds)
    pub next_interval_ms: u64,
}

/// Events broadcast to supervisor subscribers
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Supervisor (`patient_id = None`) or patient task changed state
    StateChanged {
        /// Patient task, or `None` for the supervisor
        patient_id: Option<PatientId>,
        /// New state
        state: SupervisorState,
    },
    /// A patient cycle finished
    CycleCompleted {
        /// Patient
        patient_id: PatientId,
        /// What the cycle did
        report: CycleReport,
    },
    /// An alert was recorded and routed
    AlertDispatched {
        /// Patient
        patient_id: PatientId,
        /// Alert
        alert_id: AlertId,
        /// Severity
        severity: Severity,
        /// Raising component
        source: AlertSource,
    },
    /// An alert could not be recorded or its notification failed
    AlertDispatchFailed {
        /// Patient
        patient_id: PatientId,
        /// Alert
        alert_id: AlertId,
        /// Severity
        severity: Severity,
        /// Raising component
        source: AlertSource,
        /// Error text
        error: String,
    },
    /// The decision engine produced a decision
    DecisionMade {
        /// Patient
        patient_id: PatientId,
        /// Decision
        decision: Decision,
    },
    /// The decision engine recommended an intervention
    InterventionRecommended {
        /// Patient
        patient_id: PatientId,
        /// Model description
        description: String,
    },
    /// A device failed to connect or read
    DeviceFailure {
        /// Patient being read, `None` while connecting
        patient_id: Option<PatientId>,
        /// Device
        device_id: String,
        /// Error text
        error: String,
    },
    /// The maintenance task purged old readings
    ReadingsPurged {
        /// Readings removed
        removed: usize,
    },
}
