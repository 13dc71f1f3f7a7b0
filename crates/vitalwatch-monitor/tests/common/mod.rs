//! Shared fixtures for integration tests. All devices are deterministic.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use vitalwatch_monitor::{
    Alert, InMemoryAlertStore, InMemoryPatientDirectory, InMemoryReadingStore, MonitorConfig,
    MonitoringSupervisor, Notifier, NotifyError, Patient, PatientId, PredictiveModel, SensorDevice,
    SignalType, SimulatedDevice, VitalReading,
};

/// Notifier that counts deliveries per channel
#[derive(Default)]
pub struct RecordingNotifier {
    pub urgent: AtomicUsize,
    pub standard: AtomicUsize,
    pub fail_urgent: AtomicBool,
}

impl RecordingNotifier {
    /// Make every urgent delivery fail
    pub fn set_fail_urgent(&self, fail: bool) {
        self.fail_urgent.store(fail, Ordering::SeqCst);
    }

    pub fn urgent(&self) -> usize {
        self.urgent.load(Ordering::SeqCst)
    }

    pub fn standard(&self) -> usize {
        self.standard.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify_urgent(&self, _alert: &Alert) -> Result<(), NotifyError> {
        if self.fail_urgent.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery {
                channel: "recording".into(),
                reason: "pager offline".into(),
            });
        }
        self.urgent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_standard(&self, _alert: &Alert) -> Result<(), NotifyError> {
        self.standard.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything a test needs to poke at around one supervisor
pub struct Harness {
    pub supervisor: MonitoringSupervisor,
    pub readings: Arc<InMemoryReadingStore>,
    pub alerts: Arc<InMemoryAlertStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub patients: Vec<PatientId>,
}

pub fn patients(count: usize) -> Vec<Patient> {
    (0..count)
        .map(|i| Patient::new(PatientId::new(), format!("Patient {i}"), 40 + i as u32, "FEMALE"))
        .collect()
}

pub fn harness(
    config: MonitorConfig,
    patients: Vec<Patient>,
    devices: Vec<Arc<dyn SensorDevice>>,
) -> Harness {
    harness_with_model(config, patients, devices, None)
}

/// Same as [`harness`], with the rule-based model replaced when `model` is set
pub fn harness_with_model(
    config: MonitorConfig,
    patients: Vec<Patient>,
    devices: Vec<Arc<dyn SensorDevice>>,
    model: Option<Arc<dyn PredictiveModel>>,
) -> Harness {
    let readings = Arc::new(InMemoryReadingStore::new());
    let alerts = Arc::new(InMemoryAlertStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let ids = patients.iter().map(|p| p.id.clone()).collect();

    let mut builder = MonitoringSupervisor::builder(config)
        .reading_store(readings.clone())
        .alert_store(alerts.clone())
        .notifier(notifier.clone())
        .patient_directory(Arc::new(InMemoryPatientDirectory::with_patients(patients)))
        .devices(devices);
    if let Some(model) = model {
        builder = builder.model(model);
    }
    let supervisor = builder.build().expect("valid config");

    Harness {
        supervisor,
        readings,
        alerts,
        notifier,
        patients: ids,
    }
}

/// Connected heart-rate device emitting `values` in order for one patient
pub async fn heart_rate_device(patient: &PatientId, values: Vec<f64>) -> Arc<SimulatedDevice> {
    let device = SimulatedDevice::new(format!("hr-{patient}"), "Heart Rate Monitor", 0.0)
        .with_sequence(values)
        .for_patient(patient.clone());
    device.connect().await.expect("simulated connect");
    Arc::new(device)
}

/// Seed `count` readings of `value`, two hours old
pub fn seed_history(store: &InMemoryReadingStore, patient: &PatientId, signal: SignalType, value: f64, count: usize) {
    for i in 0..count {
        store.seed(VitalReading::at(
            patient.clone(),
            signal,
            value,
            signal.default_unit(),
            "history",
            Utc::now() - Duration::hours(2) - Duration::minutes(i as i64),
        ));
    }
}
