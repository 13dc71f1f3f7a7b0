//! Integration layer for external collaborators.
//!
//! Sensor drivers, persistence and the patient directory live outside this
//! crate. This module defines the async traits the monitor talks to and
//! ships in-memory/simulated implementations used by tests and the CLI.

mod device;
mod store;

pub use device::{DeviceError, SensorDevice, SimulatedDevice};
pub use store::{
    AlertStore, InMemoryAlertStore, InMemoryPatientDirectory, InMemoryReadingStore,
    PatientDirectory, ReadingStore, StoreError,
};
