//! Supervisor start/stop, concurrency limits and shutdown latency.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{harness, heart_rate_device, patients};
use tokio::sync::{broadcast, Notify, Semaphore};
use vitalwatch_monitor::{
    Alert, DeviceError, InMemoryAlertStore, InMemoryPatientDirectory, InMemoryReadingStore,
    MonitorConfig, MonitorError, MonitorEvent, MonitoringSupervisor, Notifier, NotifyError, Patient,
    PatientDirectory, PatientId, SensorDevice, SignalType, SimulatedDevice, StoreError,
    SupervisorState, VitalReading,
};

async fn wait_for_cycles(events: &mut broadcast::Receiver<MonitorEvent>, count: usize) {
    let mut seen = 0;
    tokio::time::timeout(Duration::from_secs(10), async {
        while seen < count {
            match events.recv().await {
                Ok(MonitorEvent::CycleCompleted { .. }) => seen += 1,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await
    .expect("cycles completed in time");
}

#[tokio::test]
async fn test_start_runs_one_task_per_patient() {
    let fleet = patients(5);
    let mut devices: Vec<Arc<dyn SensorDevice>> = Vec::new();
    for patient in &fleet {
        devices.push(heart_rate_device(&patient.id, vec![72.0]).await);
    }
    let config = MonitorConfig::builder().monitoring_interval_ms(60_000).build();
    let h = harness(config, fleet, devices);
    let mut events = h.supervisor.subscribe();

    h.supervisor.start().await.unwrap();
    assert_eq!(h.supervisor.state(), SupervisorState::Running);
    wait_for_cycles(&mut events, 5).await;

    // Every task is asleep; shutdown must not wait out the interval
    let started = Instant::now();
    h.supervisor.shutdown().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(h.supervisor.state(), SupervisorState::Stopped);
    for patient in &h.patients {
        assert_eq!(h.supervisor.task_state(patient), Some(SupervisorState::Stopped));
    }
    assert_eq!(h.readings.len(), 5);
}

#[tokio::test]
async fn test_lifecycle_transitions_are_enforced() {
    let h = harness(MonitorConfig::default(), patients(1), Vec::new());

    h.supervisor.start().await.unwrap();
    assert!(matches!(h.supervisor.start().await, Err(MonitorError::InvalidState(_))));

    h.supervisor.shutdown().await.unwrap();
    // Repeated shutdown is a no-op
    h.supervisor.shutdown().await.unwrap();
    assert_eq!(h.supervisor.state(), SupervisorState::Stopped);

    assert!(matches!(h.supervisor.start().await, Err(MonitorError::InvalidState(_))));
}

#[tokio::test]
async fn test_shutdown_before_start() {
    let h = harness(MonitorConfig::default(), patients(1), Vec::new());
    h.supervisor.shutdown().await.unwrap();
    assert_eq!(h.supervisor.state(), SupervisorState::Stopped);
    assert!(h.supervisor.start().await.is_err());
}

struct UnavailableDirectory;

#[async_trait]
impl PatientDirectory for UnavailableDirectory {
    async fn by_id(&self, patient_id: &PatientId) -> Result<Patient, StoreError> {
        Err(StoreError::NotFound(patient_id.to_string()))
    }

    async fn all(&self) -> Result<Vec<Patient>, StoreError> {
        Err(StoreError::Unavailable("directory offline".into()))
    }
}

#[tokio::test]
async fn test_failed_patient_load_leaves_supervisor_idle() {
    let supervisor = MonitoringSupervisor::builder(MonitorConfig::default())
        .patient_directory(Arc::new(UnavailableDirectory))
        .build()
        .unwrap();

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, MonitorError::Store(StoreError::Unavailable(_))));
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert!(supervisor.run_cycle_once(&PatientId::new()).await.is_err());
}

#[tokio::test]
async fn test_refused_connection_does_not_block_start() {
    let device = Arc::new(SimulatedDevice::new("hr-refuse", "Heart Rate Monitor", 70.0));
    device.set_refuse_connect(true);
    let h = harness(MonitorConfig::default(), patients(1), vec![device as Arc<dyn SensorDevice>]);
    let mut events = h.supervisor.subscribe();

    h.supervisor.start().await.unwrap();

    let mut refused = false;
    while let Ok(event) = events.try_recv() {
        if let MonitorEvent::DeviceFailure { patient_id: None, device_id, .. } = event {
            assert_eq!(device_id, "hr-refuse");
            refused = true;
        }
    }
    assert!(refused);
    h.supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_queued_readings_flushed_on_shutdown() {
    let fleet = patients(1);
    let device = heart_rate_device(&fleet[0].id, vec![72.0]).await;
    let config = MonitorConfig::builder().monitoring_interval_ms(60_000).build();
    let h = harness(config, fleet, vec![device as Arc<dyn SensorDevice>]);
    let mut events = h.supervisor.subscribe();

    h.readings.set_available(false);
    h.supervisor.start().await.unwrap();
    wait_for_cycles(&mut events, 1).await;
    assert!(h.readings.is_empty());

    h.readings.set_available(true);
    h.supervisor.shutdown().await.unwrap();
    assert_eq!(h.readings.len(), 1);
}

/// Device shared by every patient that tracks how many reads overlap
struct ConcurrencyGauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl SensorDevice for ConcurrencyGauge {
    fn id(&self) -> &str {
        "gauge"
    }

    fn category(&self) -> &str {
        "Heart Rate Monitor"
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn take_reading(
        &self,
        patient_id: &PatientId,
        signal_type: SignalType,
    ) -> Result<VitalReading, DeviceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(VitalReading::new(patient_id.clone(), signal_type, 72.0, "bpm", "gauge"))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_under_load() {
    let gauge = Arc::new(ConcurrencyGauge {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let config = MonitorConfig::builder()
        .monitoring_interval_ms(10)
        .max_concurrent_patients(4)
        .build();
    let h = harness(config, patients(20), vec![gauge.clone() as Arc<dyn SensorDevice>]);
    let mut events = h.supervisor.subscribe();

    h.supervisor.start().await.unwrap();
    wait_for_cycles(&mut events, 40).await;
    h.supervisor.shutdown().await.unwrap();

    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!((1..=4).contains(&peak), "peak concurrency {peak}");
    assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);

    let readings = h.readings.all();
    for patient in &h.patients {
        assert!(readings.iter().any(|r| r.patient_id() == patient), "patient {patient} never polled");
        assert_eq!(h.supervisor.task_state(patient), Some(SupervisorState::Stopped));
    }
}

#[tokio::test]
async fn test_waiting_tasks_exit_promptly_on_shutdown() {
    let hung = Arc::new(SimulatedDevice::new("hr-hung", "Heart Rate Monitor", 70.0));
    hung.connect().await.unwrap();
    hung.set_hanging(true);

    let config = MonitorConfig::builder()
        .max_concurrent_patients(1)
        .device_read_timeout_ms(500)
        .build();
    let h = harness(config, patients(3), vec![hung as Arc<dyn SensorDevice>]);

    h.supervisor.start().await.unwrap();
    // One task holds the only permit inside a hung read
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    h.supervisor.shutdown().await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(1000),
        "shutdown took {:?}",
        started.elapsed()
    );

    for patient in &h.patients {
        assert_eq!(h.supervisor.task_state(patient), Some(SupervisorState::Stopped));
    }
}

/// Notifier whose urgent deliveries for one patient block until released
struct GatedNotifier {
    stalled_patient: PatientId,
    entered: Notify,
    release: Semaphore,
    delivered: AtomicUsize,
}

#[async_trait]
impl Notifier for GatedNotifier {
    fn name(&self) -> &str {
        "gated"
    }

    async fn notify_urgent(&self, alert: &Alert) -> Result<(), NotifyError> {
        if alert.patient_id() == &self.stalled_patient {
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_standard(&self, _alert: &Alert) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stalled_page_does_not_hold_up_other_patients() {
    let fleet = patients(2);
    let (slow, fast) = (fleet[0].id.clone(), fleet[1].id.clone());
    let devices: Vec<Arc<dyn SensorDevice>> = vec![
        heart_rate_device(&slow, vec![200.0]).await as Arc<dyn SensorDevice>,
        heart_rate_device(&fast, vec![200.0]).await as Arc<dyn SensorDevice>,
    ];
    let notifier = Arc::new(GatedNotifier {
        stalled_patient: slow.clone(),
        entered: Notify::new(),
        release: Semaphore::new(0),
        delivered: AtomicUsize::new(0),
    });
    let supervisor = Arc::new(
        MonitoringSupervisor::builder(MonitorConfig::default())
            .reading_store(Arc::new(InMemoryReadingStore::new()))
            .alert_store(Arc::new(InMemoryAlertStore::new()))
            .notifier(notifier.clone())
            .patient_directory(Arc::new(InMemoryPatientDirectory::with_patients(fleet)))
            .devices(devices)
            .build()
            .unwrap(),
    );

    let slow_cycle = {
        let supervisor = Arc::clone(&supervisor);
        let slow = slow.clone();
        tokio::spawn(async move { supervisor.run_cycle_once(&slow).await })
    };
    tokio::time::timeout(Duration::from_secs(5), notifier.entered.notified())
        .await
        .expect("urgent page started");

    // The other patient pages and finishes while the first page hangs
    let report = tokio::time::timeout(Duration::from_secs(1), supervisor.run_cycle_once(&fast))
        .await
        .expect("cycle not blocked by another patient's page")
        .unwrap();
    assert_eq!(report.alerts_dispatched, 1);
    assert_eq!(notifier.delivered.load(Ordering::SeqCst), 1);
    assert!(!slow_cycle.is_finished());

    notifier.release.add_permits(10);
    let report = slow_cycle.await.unwrap().unwrap();
    assert_eq!(report.alerts_dispatched, 1);
    assert_eq!(notifier.delivered.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_anomaly_tightens_then_restores_cadence() {
    let fleet = patients(1);
    let patient = fleet[0].id.clone();
    // 45 bpm is a medium guideline alert, 60 is back in range
    let device = heart_rate_device(&patient, vec![45.0, 60.0]).await;
    let config = MonitorConfig::builder()
        .monitoring_interval_ms(10_000)
        .adjusted_interval_ms(1_000)
        .build();
    let h = harness(config, fleet, vec![device as Arc<dyn SensorDevice>]);
    let mut events = h.supervisor.subscribe();

    h.supervisor.start().await.unwrap();
    // t=0 anomaly, t=1s recovery, next cycle not before t=11s
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let mut intervals = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let MonitorEvent::CycleCompleted { report, .. } = event {
            intervals.push(report.next_interval_ms);
        }
    }
    assert_eq!(intervals, vec![1_000, 10_000]);

    h.supervisor.shutdown().await.unwrap();
    assert_eq!(h.readings.len(), 2);
}
