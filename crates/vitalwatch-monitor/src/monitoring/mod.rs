//! Monitoring context: per-patient cycles and the supervisor that owns them.
//!
//! Each cycle retries queued readings, polls the patient's devices, persists
//! fresh readings, refreshes baselines when due, evaluates and dispatches
//! detector alerts, consults the decision engine and then sleeps.

mod events;
mod patient;
mod supervisor;

pub use events::{CycleReport, MonitorEvent, SupervisorState};
pub use supervisor::{MonitoringSupervisor, SupervisorBuilder};
