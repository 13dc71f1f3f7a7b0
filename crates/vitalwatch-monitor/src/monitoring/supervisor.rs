//! Fleet supervisor: one cooperative task per patient.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;

use super::events::{CycleReport, MonitorEvent, SupervisorState};
use super::patient::PatientMonitor;
use crate::alerting::{AlertDispatcher, Notifier, TracingNotifier};
use crate::config::MonitorConfig;
use crate::decision::{DecisionEngine, PredictiveModel, RuleBasedModel};
use crate::detection::{AnomalyDetector, BaselineTracker, TrendAnalyzer, TrendSummary};
use crate::domain::{PatientId, SignalType};
use crate::integration::{
    AlertStore, InMemoryAlertStore, InMemoryPatientDirectory, InMemoryReadingStore, PatientDirectory,
    ReadingStore, SensorDevice,
};
use crate::{MonitorError, Result};

/// Components shared by every patient task
pub(crate) struct Shared {
    pub(crate) config: MonitorConfig,
    pub(crate) devices: Vec<Arc<dyn SensorDevice>>,
    pub(crate) readings: Arc<dyn ReadingStore>,
    pub(crate) directory: Arc<dyn PatientDirectory>,
    pub(crate) tracker: BaselineTracker,
    pub(crate) detector: AnomalyDetector,
    pub(crate) engine: DecisionEngine,
    pub(crate) dispatcher: AlertDispatcher,
    pub(crate) permits: Semaphore,
    events: broadcast::Sender<MonitorEvent>,
    task_states: DashMap<PatientId, SupervisorState>,
}

impl Shared {
    pub(crate) fn publish(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_task_state(&self, patient_id: &PatientId, state: SupervisorState) {
        self.task_states.insert(patient_id.clone(), state);
        self.publish(MonitorEvent::StateChanged {
            patient_id: Some(patient_id.clone()),
            state,
        });
    }
}

/// Builder for [`MonitoringSupervisor`].
///
/// Collaborators not supplied fall back to the in-memory stores, the
/// rule-based model and the tracing notifier.
pub struct SupervisorBuilder {
    config: MonitorConfig,
    devices: Vec<Arc<dyn SensorDevice>>,
    readings: Option<Arc<dyn ReadingStore>>,
    alerts: Option<Arc<dyn AlertStore>>,
    directory: Option<Arc<dyn PatientDirectory>>,
    model: Option<Arc<dyn PredictiveModel>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SupervisorBuilder {
    fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            devices: Vec::new(),
            readings: None,
            alerts: None,
            directory: None,
            model: None,
            notifier: None,
        }
    }

    /// Add a sensor device
    pub fn device(mut self, device: Arc<dyn SensorDevice>) -> Self {
        self.devices.push(device);
        self
    }

    /// Add several sensor devices
    pub fn devices(mut self, devices: impl IntoIterator<Item = Arc<dyn SensorDevice>>) -> Self {
        self.devices.extend(devices);
        self
    }

    /// Set the reading store
    pub fn reading_store(mut self, store: Arc<dyn ReadingStore>) -> Self {
        self.readings = Some(store);
        self
    }

    /// Set the alert store
    pub fn alert_store(mut self, store: Arc<dyn AlertStore>) -> Self {
        self.alerts = Some(store);
        self
    }

    /// Set the patient directory
    pub fn patient_directory(mut self, directory: Arc<dyn PatientDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Set the predictive model
    pub fn model(mut self, model: Arc<dyn PredictiveModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the notifier
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate the configuration and assemble the supervisor
    pub fn build(self) -> Result<MonitoringSupervisor> {
        self.config.validate()?;
        let config = self.config;

        let readings = self
            .readings
            .unwrap_or_else(|| Arc::new(InMemoryReadingStore::new()));
        let alerts = self.alerts.unwrap_or_else(|| Arc::new(InMemoryAlertStore::new()));
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(InMemoryPatientDirectory::new()));
        let model = self
            .model
            .unwrap_or_else(|| Arc::new(RuleBasedModel::new(config.decision.intervention_threshold)));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier::new()));

        let (events, _) = broadcast::channel(config.event_capacity);
        let (shutdown_tx, _) = watch::channel(false);

        let shared = Shared {
            tracker: BaselineTracker::new(config.baseline.clone(), Arc::clone(&readings)),
            detector: AnomalyDetector::new(config.anomaly.clone()),
            engine: DecisionEngine::new(config.decision.clone(), model),
            dispatcher: AlertDispatcher::new(config.dispatch.clone(), alerts, notifier),
            permits: Semaphore::new(config.max_concurrent_patients),
            devices: self.devices,
            readings,
            directory,
            events,
            task_states: DashMap::new(),
            config,
        };

        Ok(MonitoringSupervisor {
            shared: Arc::new(shared),
            state: RwLock::new(SupervisorState::Idle),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            monitors: DashMap::new(),
        })
    }
}

/// Runs the monitoring loop for every patient in the directory.
///
/// Lifecycle is `Idle → Running → Stopping → Stopped`. Shutdown is a single
/// watch signal observed at cycle boundaries, during the inter-cycle sleep
/// and while a task waits for a concurrency permit.
pub struct MonitoringSupervisor {
    shared: Arc<Shared>,
    state: RwLock<SupervisorState>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    monitors: DashMap<PatientId, Arc<AsyncMutex<PatientMonitor>>>,
}

impl MonitoringSupervisor {
    /// Start building a supervisor
    pub fn builder(config: MonitorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(config)
    }

    /// Current supervisor state
    pub fn state(&self) -> SupervisorState {
        *self.state.read()
    }

    /// Current state of one patient task
    pub fn task_state(&self, patient_id: &PatientId) -> Option<SupervisorState> {
        self.shared.task_states.get(patient_id).map(|entry| *entry)
    }

    /// Receive monitor events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.shared.events.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Alert dispatcher, for status updates and queries
    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.shared.dispatcher
    }

    /// Baseline tracker
    pub fn baselines(&self) -> &BaselineTracker {
        &self.shared.tracker
    }

    fn set_state(&self, state: SupervisorState) {
        *self.state.write() = state;
        tracing::info!(state = %state, "Supervisor state changed");
        self.shared.publish(MonitorEvent::StateChanged {
            patient_id: None,
            state,
        });
    }

    /// Connect devices, load patients and spawn one task per patient
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != SupervisorState::Idle {
                return Err(MonitorError::InvalidState(format!("cannot start while {}", *state)));
            }
            // Claimed here so a concurrent start fails
            *state = SupervisorState::Running;
        }

        let patients = match self.shared.directory.all().await {
            Ok(patients) => patients,
            Err(e) => {
                *self.state.write() = SupervisorState::Idle;
                return Err(e.into());
            }
        };

        for device in &self.shared.devices {
            if let Err(e) = device.connect().await {
                tracing::warn!(device_id = %device.id(), error = %e, "Device connection failed");
                self.shared.publish(MonitorEvent::DeviceFailure {
                    patient_id: None,
                    device_id: device.id().to_string(),
                    error: e.to_string(),
                });
            }
        }

        let mut tasks = self.tasks.lock();
        for patient in patients {
            let patient_id = patient.id.clone();
            let monitor = Arc::new(AsyncMutex::new(PatientMonitor::new(
                patient,
                self.shared.config.monitoring_interval(),
            )));
            self.monitors.insert(patient_id.clone(), Arc::clone(&monitor));
            self.shared.set_task_state(&patient_id, SupervisorState::Idle);

            tasks.push(tokio::spawn(patient_loop(
                Arc::clone(&self.shared),
                monitor,
                self.shutdown_tx.subscribe(),
            )));
        }
        tasks.push(tokio::spawn(maintenance_loop(
            Arc::clone(&self.shared),
            self.shutdown_tx.subscribe(),
        )));

        tracing::info!(
            patients = self.monitors.len(),
            devices = self.shared.devices.len(),
            max_concurrent = self.shared.config.max_concurrent_patients,
            "Monitoring started"
        );
        self.set_state(SupervisorState::Running);
        Ok(())
    }

    /// Signal every task, wait for in-flight cycles and flushes, then disconnect devices
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                SupervisorState::Running => *state = SupervisorState::Stopping,
                SupervisorState::Idle => {
                    *state = SupervisorState::Stopped;
                    return Ok(());
                }
                SupervisorState::Stopping | SupervisorState::Stopped => return Ok(()),
            }
        }
        self.set_state(SupervisorState::Stopping);
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Monitoring task panicked");
            }
        }
        self.shared.dispatcher.drain().await;

        for device in &self.shared.devices {
            if let Err(e) = device.disconnect().await {
                tracing::warn!(device_id = %device.id(), error = %e, "Device disconnect failed");
            }
        }

        self.set_state(SupervisorState::Stopped);
        Ok(())
    }

    /// Run one cycle for a patient on demand.
    ///
    /// Waits for the patient's running cycle, if any, so cycles never overlap.
    pub async fn run_cycle_once(&self, patient_id: &PatientId) -> Result<CycleReport> {
        let monitor = match self.monitors.get(patient_id).map(|entry| Arc::clone(entry.value())) {
            Some(monitor) => monitor,
            None => {
                let patient = self.shared.directory.by_id(patient_id).await?;
                let monitor = Arc::new(AsyncMutex::new(PatientMonitor::new(
                    patient,
                    self.shared.config.monitoring_interval(),
                )));
                Arc::clone(self.monitors.entry(patient_id.clone()).or_insert(monitor).value())
            }
        };

        let _permit = self
            .shared
            .permits
            .acquire()
            .await
            .map_err(|_| MonitorError::InvalidState("concurrency limiter closed".into()))?;
        let mut monitor = monitor.lock().await;
        Ok(monitor.run_cycle(&self.shared).await)
    }

    /// Trend summary for one patient and signal over the last `window_minutes`
    pub async fn analyze_trends(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
        window_minutes: u64,
    ) -> Result<Option<TrendSummary>> {
        let readings = self
            .shared
            .readings
            .query_by_patient_and_type(patient_id, signal_type, window_minutes)
            .await?;
        let readings: Vec<_> = readings
            .into_iter()
            .filter(|r| r.matches(patient_id, signal_type))
            .collect();
        Ok(TrendAnalyzer::analyze(&readings))
    }

    /// Purge readings past the retention period now
    pub async fn purge_now(&self) -> Result<usize> {
        purge(&self.shared).await
    }
}

/// Resolves once shutdown is signalled or the supervisor is dropped
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn patient_loop(
    shared: Arc<Shared>,
    monitor: Arc<AsyncMutex<PatientMonitor>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let patient_id = monitor.lock().await.patient_id().clone();
    shared.set_task_state(&patient_id, SupervisorState::Running);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let interval = {
            let permit = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => break,
                permit = shared.permits.acquire() => permit,
            };
            let Ok(_permit) = permit else { break };

            let mut monitor = monitor.lock().await;
            monitor.run_cycle(&shared).await;
            monitor.interval()
        };

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_signalled(&mut shutdown) => break,
        }
    }

    shared.set_task_state(&patient_id, SupervisorState::Stopping);
    {
        let mut monitor = monitor.lock().await;
        if monitor.queued() > 0 {
            monitor.flush(&shared).await;
        }
    }
    shared.set_task_state(&patient_id, SupervisorState::Stopped);
    tracing::debug!(patient_id = %patient_id, "Patient task stopped");
}

async fn maintenance_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(shared.config.purge_interval()) => {}
            _ = shutdown_signalled(&mut shutdown) => break,
        }
        if let Err(e) = purge(&shared).await {
            tracing::warn!(error = %e, "Reading purge failed");
        }
    }
}

async fn purge(shared: &Shared) -> Result<usize> {
    let removed = shared
        .readings
        .purge_older_than(shared.config.retention_days)
        .await?;
    tracing::info!(removed, retention_days = shared.config.retention_days, "Old readings purged");
    shared.publish(MonitorEvent::ReadingsPurged { removed });
    Ok(removed)
}
