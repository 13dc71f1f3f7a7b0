//! Sensor device abstraction and a deterministic simulated device.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{PatientId, SignalType, VitalReading};

/// Errors raised by sensor devices
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device could not be reached
    #[error("Device {device_id} unreachable: {reason}")]
    Unreachable {
        /// Device identifier
        device_id: String,
        /// Driver-supplied reason
        reason: String,
    },

    /// The device did not answer within the read timeout
    #[error("Device {device_id} timed out after {timeout_ms} ms")]
    Timeout {
        /// Device identifier
        device_id: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// A read was attempted on a disconnected device
    #[error("Device {0} is not connected")]
    NotConnected(String),

    /// The device returned a reading for another patient or signal type
    #[error("Device {device_id} returned a {actual} reading, expected {expected}")]
    MismatchedReading {
        /// Device identifier
        device_id: String,
        /// Requested patient and signal type
        expected: String,
        /// What the device produced
        actual: String,
    },

    /// The device produced NaN or an infinite value
    #[error("Device {device_id} returned a non-finite {signal_type} value ({value})")]
    NonFiniteValue {
        /// Device identifier
        device_id: String,
        /// Requested signal type
        signal_type: SignalType,
        /// Raw value
        value: f64,
    },
}

/// A connected vital-sign sensor.
///
/// Implementations are owned by the supervisor behind `Arc<dyn SensorDevice>`
/// and may be polled from several patient tasks at once.
#[async_trait]
pub trait SensorDevice: Send + Sync {
    /// Stable device identifier
    fn id(&self) -> &str;

    /// Free-form category, e.g. "Heart Rate Monitor"
    fn category(&self) -> &str;

    /// Patient the device is attached to, `None` for shared devices
    fn assigned_patient(&self) -> Option<&PatientId> {
        None
    }

    /// Whether the device is currently connected
    fn is_connected(&self) -> bool;

    /// Open the connection
    async fn connect(&self) -> Result<(), DeviceError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), DeviceError>;

    /// Take one reading for the given patient and signal type
    async fn take_reading(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
    ) -> Result<VitalReading, DeviceError>;
}

/// How a simulated device produces values
#[derive(Debug, Clone)]
enum Waveform {
    Sine {
        base: f64,
        amplitude: f64,
        period: u64,
    },
    Sequence(Vec<f64>),
}

/// Simulated device producing deterministic values.
///
/// Values follow a sinusoid around a base value, or a fixed sequence that
/// repeats its last element once exhausted. Failures and hangs can be
/// toggled at runtime.
#[derive(Debug)]
pub struct SimulatedDevice {
    id: String,
    category: String,
    patient: Option<PatientId>,
    waveform: Waveform,
    step: AtomicU64,
    connected: AtomicBool,
    failing: AtomicBool,
    hanging: AtomicBool,
    refuse_connect: AtomicBool,
}

impl SimulatedDevice {
    /// Create a shared device emitting a constant value
    pub fn new(id: impl Into<String>, category: impl Into<String>, base: f64) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            patient: None,
            waveform: Waveform::Sine {
                base,
                amplitude: 0.0,
                period: 1,
            },
            step: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
            refuse_connect: AtomicBool::new(false),
        }
    }

    /// Oscillate around the base value with the given amplitude and period (in reads)
    pub fn with_sine(mut self, amplitude: f64, period: u64) -> Self {
        if let Waveform::Sine { base, .. } = self.waveform {
            self.waveform = Waveform::Sine {
                base,
                amplitude,
                period: period.max(1),
            };
        }
        self
    }

    /// Emit the given values in order, then keep repeating the last one
    pub fn with_sequence(mut self, values: Vec<f64>) -> Self {
        if !values.is_empty() {
            self.waveform = Waveform::Sequence(values);
        }
        self
    }

    /// Attach the device to a single patient
    pub fn for_patient(mut self, patient_id: PatientId) -> Self {
        self.patient = Some(patient_id);
        self
    }

    /// Make every read fail as unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every read block until cancelled
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Make `connect` fail
    pub fn set_refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful reads so far
    pub fn reads(&self) -> u64 {
        self.step.load(Ordering::SeqCst)
    }

    fn next_value(&self) -> f64 {
        let step = self.step.fetch_add(1, Ordering::SeqCst);
        match &self.waveform {
            Waveform::Sine {
                base,
                amplitude,
                period,
            } => {
                let phase = 2.0 * PI * (step % period) as f64 / *period as f64;
                base + amplitude * phase.sin()
            }
            Waveform::Sequence(values) => {
                let idx = (step as usize).min(values.len() - 1);
                values[idx]
            }
        }
    }
}

#[async_trait]
impl SensorDevice for SimulatedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn assigned_patient(&self) -> Option<&PatientId> {
        self.patient.as_ref()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(DeviceError::Unreachable {
                device_id: self.id.clone(),
                reason: "connection refused".into(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(device_id = %self.id, category = %self.category, "Simulated device connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.connected.store(false, Ordering::SeqCst);
        tracing::debug!(device_id = %self.id, "Simulated device disconnected");
        Ok(())
    }

    async fn take_reading(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
    ) -> Result<VitalReading, DeviceError> {
        if !self.is_connected() {
            return Err(DeviceError::NotConnected(self.id.clone()));
        }
        if self.hanging.load(Ordering::SeqCst) {
            // Never answers; callers bound this with a timeout.
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeviceError::Unreachable {
                device_id: self.id.clone(),
                reason: "simulated failure".into(),
            });
        }

        Ok(VitalReading::new(
            patient_id.clone(),
            signal_type,
            self.next_value(),
            signal_type.default_unit(),
            self.id.clone(),
        ))
    }
}
