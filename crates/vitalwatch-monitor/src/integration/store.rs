//! Persistence collaborators and in-memory reference implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;

use crate::domain::{Alert, AlertId, AlertStatus, Patient, PatientId, SignalType, VitalReading};

/// Errors raised by stores and the patient directory
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The alert workflow does not allow this status change
    #[error("Alert {alert_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Alert being updated
        alert_id: String,
        /// Current status
        from: AlertStatus,
        /// Requested status
        to: AlertStatus,
    },
}

/// Append/query store for vital readings
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a reading
    async fn append(&self, reading: &VitalReading) -> Result<(), StoreError>;

    /// Readings for a patient within the last `window_minutes`
    async fn query_by_patient(
        &self,
        patient_id: &PatientId,
        window_minutes: u64,
    ) -> Result<Vec<VitalReading>, StoreError>;

    /// Readings for a patient and signal type within the last `window_minutes`
    async fn query_by_patient_and_type(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
        window_minutes: u64,
    ) -> Result<Vec<VitalReading>, StoreError>;

    /// Delete readings older than `days`, returning how many were removed
    async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError>;
}

/// Durable record of every alert
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Record a new alert
    async fn append(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Alerts still awaiting acknowledgement
    async fn pending(&self) -> Result<Vec<Alert>, StoreError>;

    /// Every alert raised for a patient
    async fn by_patient(&self, patient_id: &PatientId) -> Result<Vec<Alert>, StoreError>;

    /// Change an alert's status, returning the updated alert
    async fn update_status(&self, alert_id: &AlertId, status: AlertStatus) -> Result<Alert, StoreError>;
}

/// Read-only source of patient context
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// Look up one patient
    async fn by_id(&self, patient_id: &PatientId) -> Result<Patient, StoreError>;

    /// Every monitored patient
    async fn all(&self) -> Result<Vec<Patient>, StoreError>;
}

/// Longest window honoured by the in-memory stores (100 years)
const MAX_WINDOW_MINUTES: u64 = 100 * 365 * 24 * 60;

fn window_cutoff(window_minutes: u64) -> chrono::DateTime<Utc> {
    let minutes = window_minutes.min(MAX_WINDOW_MINUTES) as i64;
    Utc::now() - ChronoDuration::minutes(minutes)
}

/// In-memory reading store.
///
/// `set_available(false)` makes every call fail, which is how tests exercise
/// the retry path.
#[derive(Debug)]
pub struct InMemoryReadingStore {
    readings: RwLock<Vec<VitalReading>>,
    available: AtomicBool,
}

impl Default for InMemoryReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReadingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            readings: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert a reading directly, bypassing availability
    pub fn seed(&self, reading: VitalReading) {
        self.readings.write().push(reading);
    }

    /// Number of stored readings
    pub fn len(&self) -> usize {
        self.readings.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.readings.read().is_empty()
    }

    /// Snapshot of every stored reading
    pub fn all(&self) -> Vec<VitalReading> {
        self.readings.read().clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("reading store offline".into()))
        }
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn append(&self, reading: &VitalReading) -> Result<(), StoreError> {
        self.check()?;
        self.readings.write().push(reading.clone());
        Ok(())
    }

    async fn query_by_patient(
        &self,
        patient_id: &PatientId,
        window_minutes: u64,
    ) -> Result<Vec<VitalReading>, StoreError> {
        self.check()?;
        let cutoff = window_cutoff(window_minutes);
        Ok(self
            .readings
            .read()
            .iter()
            .filter(|r| r.patient_id() == patient_id && *r.timestamp() >= cutoff)
            .cloned()
            .collect())
    }

    async fn query_by_patient_and_type(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
        window_minutes: u64,
    ) -> Result<Vec<VitalReading>, StoreError> {
        self.check()?;
        let cutoff = window_cutoff(window_minutes);
        Ok(self
            .readings
            .read()
            .iter()
            .filter(|r| r.matches(patient_id, signal_type) && *r.timestamp() >= cutoff)
            .cloned()
            .collect())
    }

    async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError> {
        self.check()?;
        let cutoff = window_cutoff(u64::from(days) * 24 * 60);
        let mut readings = self.readings.write();
        let before = readings.len();
        readings.retain(|r| *r.timestamp() >= cutoff);
        Ok(before - readings.len())
    }
}

/// In-memory alert store preserving insertion order
#[derive(Debug)]
pub struct InMemoryAlertStore {
    alerts: RwLock<Vec<Alert>>,
    available: AtomicBool,
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAlertStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Snapshot of every recorded alert
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Number of recorded alerts
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Whether no alert has been recorded
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("alert store offline".into()))
        }
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn append(&self, alert: &Alert) -> Result<(), StoreError> {
        self.check()?;
        self.alerts.write().push(alert.clone());
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<Alert>, StoreError> {
        self.check()?;
        Ok(self.alerts.read().iter().filter(|a| a.is_pending()).cloned().collect())
    }

    async fn by_patient(&self, patient_id: &PatientId) -> Result<Vec<Alert>, StoreError> {
        self.check()?;
        Ok(self
            .alerts
            .read()
            .iter()
            .filter(|a| a.patient_id() == patient_id)
            .cloned()
            .collect())
    }

    async fn update_status(&self, alert_id: &AlertId, status: AlertStatus) -> Result<Alert, StoreError> {
        self.check()?;
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id() == alert_id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", alert_id)))?;

        let from = alert.status();
        if !alert.transition(status) {
            return Err(StoreError::InvalidTransition {
                alert_id: alert_id.to_string(),
                from,
                to: status,
            });
        }
        Ok(alert.clone())
    }
}

/// In-memory patient directory
#[derive(Debug, Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<PatientId, Patient>>,
}

impl InMemoryPatientDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory holding the given patients
    pub fn with_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        let directory = Self::new();
        for patient in patients {
            directory.insert(patient);
        }
        directory
    }

    /// Add or replace a patient
    pub fn insert(&self, patient: Patient) {
        self.patients.write().insert(patient.id.clone(), patient);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn by_id(&self, patient_id: &PatientId) -> Result<Patient, StoreError> {
        self.patients
            .read()
            .get(patient_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", patient_id)))
    }

    async fn all(&self) -> Result<Vec<Patient>, StoreError> {
        let mut patients: Vec<Patient> = self.patients.read().values().cloned().collect();
        patients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertSource, Severity};

    fn reading_aged(patient: &PatientId, signal: SignalType, value: f64, age: ChronoDuration) -> VitalReading {
        VitalReading::at(patient.clone(), signal, value, signal.default_unit(), "dev", Utc::now() - age)
    }

    #[tokio::test]
    async fn test_query_respects_window_and_type() {
        let store = InMemoryReadingStore::new();
        let patient = PatientId::new();
        let other = PatientId::new();

        store.seed(reading_aged(&patient, SignalType::HeartRate, 70.0, ChronoDuration::minutes(5)));
        store.seed(reading_aged(&patient, SignalType::HeartRate, 80.0, ChronoDuration::minutes(90)));
        store.seed(reading_aged(&patient, SignalType::Temperature, 36.9, ChronoDuration::minutes(5)));
        store.seed(reading_aged(&other, SignalType::HeartRate, 110.0, ChronoDuration::minutes(5)));

        let recent = store.query_by_patient(&patient, 60).await.unwrap();
        assert_eq!(recent.len(), 2);

        let hr = store
            .query_by_patient_and_type(&patient, SignalType::HeartRate, 120)
            .await
            .unwrap();
        assert_eq!(hr.len(), 2);
        assert!(hr.iter().all(|r| r.matches(&patient, SignalType::HeartRate)));
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let store = InMemoryReadingStore::new();
        let patient = PatientId::new();
        store.seed(reading_aged(&patient, SignalType::HeartRate, 70.0, ChronoDuration::days(31)));
        store.seed(reading_aged(&patient, SignalType::HeartRate, 72.0, ChronoDuration::days(2)));

        assert_eq!(store.purge_older_than(30).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = InMemoryReadingStore::new();
        store.set_available(false);
        let reading = VitalReading::new(PatientId::new(), SignalType::HeartRate, 70.0, "bpm", "dev");

        assert!(matches!(store.append(&reading).await, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_alert_status_transitions() {
        let store = InMemoryAlertStore::new();
        let patient = PatientId::new();
        let alert = Alert::new(patient.clone(), Severity::High, "HR 130", None, AlertSource::Detector);
        let id = alert.id().clone();
        store.append(&alert).await.unwrap();

        assert_eq!(store.pending().await.unwrap().len(), 1);

        let updated = store.update_status(&id, AlertStatus::Acknowledged).await.unwrap();
        assert_eq!(updated.status(), AlertStatus::Acknowledged);
        assert!(store.pending().await.unwrap().is_empty());

        let err = store.update_status(&id, AlertStatus::Pending).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let missing = store.update_status(&AlertId::new(), AlertStatus::Resolved).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        assert_eq!(store.by_patient(&patient).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_patient_directory() {
        let patient = Patient::new(PatientId::new(), "Ada", 61, "FEMALE");
        let id = patient.id.clone();
        let directory = InMemoryPatientDirectory::with_patients(vec![patient]);

        assert_eq!(directory.by_id(&id).await.unwrap().name, "Ada");
        assert!(directory.by_id(&PatientId::new()).await.is_err());
        assert_eq!(directory.all().await.unwrap().len(), 1);
    }
}
