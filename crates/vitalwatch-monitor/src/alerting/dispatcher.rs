//! Alert recording and tiered delivery.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::notifier::{Notifier, NotifyError};
use crate::config::ConfigError;
use crate::domain::{Alert, AlertId, AlertStatus, PatientId, Severity};
use crate::integration::AlertStore;
use crate::MonitorError;

/// Configuration for alert dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on one notification call (milliseconds)
    pub notify_timeout_ms: u64,
    /// Deliver medium alerts over the standard channel
    pub standard_enabled: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            notify_timeout_ms: 10_000,
            standard_enabled: true,
        }
    }
}

impl DispatchConfig {
    /// Notification timeout as a duration
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notify_timeout_ms == 0 {
            return Err(ConfigError::Invalid("notify_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// How an alert left the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Urgent notification delivered
    NotifiedUrgent,
    /// Standard notification handed to a background task
    QueuedStandard,
    /// Recorded without notification
    RecordedOnly,
}

/// Records every alert, then routes it by severity.
///
/// An alert is never notified unless it was recorded first.
pub struct AlertDispatcher {
    config: DispatchConfig,
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl AlertDispatcher {
    /// Create a dispatcher
    pub fn new(config: DispatchConfig, store: Arc<dyn AlertStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            store,
            notifier,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Record and route an alert
    #[tracing::instrument(skip(self, alert), fields(alert_id = %alert.id(), patient_id = %alert.patient_id(), severity = %alert.severity()))]
    pub async fn handle(&self, alert: Alert) -> Result<DispatchOutcome, MonitorError> {
        if let Err(e) = self.store.append(&alert).await {
            if alert.severity().is_urgent() {
                tracing::error!(error = %e, "ESCALATION: urgent alert could not be recorded, notification withheld");
                return Err(MonitorError::Escalation {
                    alert_id: alert.id().clone(),
                    patient_id: alert.patient_id().clone(),
                    severity: alert.severity(),
                    source: e,
                });
            }
            tracing::warn!(error = %e, "Alert could not be recorded");
            return Err(e.into());
        }

        match alert.severity() {
            Severity::Critical | Severity::High => {
                self.notify_urgent(&alert).await?;
                tracing::info!("Urgent alert delivered");
                Ok(DispatchOutcome::NotifiedUrgent)
            }
            Severity::Medium if self.config.standard_enabled => {
                self.spawn_standard(alert);
                Ok(DispatchOutcome::QueuedStandard)
            }
            Severity::Medium | Severity::Low => {
                tracing::debug!("Alert recorded");
                Ok(DispatchOutcome::RecordedOnly)
            }
        }
    }

    async fn notify_urgent(&self, alert: &Alert) -> Result<(), NotifyError> {
        match tokio::time::timeout(self.config.notify_timeout(), self.notifier.notify_urgent(alert)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                channel: self.notifier.name().to_string(),
                timeout_ms: self.config.notify_timeout_ms,
            }),
        }
    }

    fn spawn_standard(&self, alert: Alert) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.config.notify_timeout();

        let handle = tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, notifier.notify_standard(&alert)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(alert_id = %alert.id(), error = %e, "Standard notification failed");
                }
                Err(_) => {
                    tracing::warn!(alert_id = %alert.id(), "Standard notification timed out");
                }
            }
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Wait for every background standard notification to finish
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.in_flight.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Standard notification task aborted");
            }
        }
    }

    async fn set_status(&self, alert_id: &AlertId, status: AlertStatus) -> Result<Alert, MonitorError> {
        let alert = self.store.update_status(alert_id, status).await?;
        tracing::info!(alert_id = %alert_id, status = ?status, "Alert status updated");
        Ok(alert)
    }

    /// Mark an alert as seen by care staff
    pub async fn acknowledge(&self, alert_id: &AlertId) -> Result<Alert, MonitorError> {
        self.set_status(alert_id, AlertStatus::Acknowledged).await
    }

    /// Close an alert after intervention
    pub async fn resolve(&self, alert_id: &AlertId) -> Result<Alert, MonitorError> {
        self.set_status(alert_id, AlertStatus::Resolved).await
    }

    /// Close an alert as a false alarm
    pub async fn mark_false_alarm(&self, alert_id: &AlertId) -> Result<Alert, MonitorError> {
        self.set_status(alert_id, AlertStatus::FalseAlarm).await
    }

    /// Alerts awaiting acknowledgement
    pub async fn pending(&self) -> Result<Vec<Alert>, MonitorError> {
        Ok(self.store.pending().await?)
    }

    /// Every alert raised for a patient
    pub async fn for_patient(&self, patient_id: &PatientId) -> Result<Vec<Alert>, MonitorError> {
        Ok(self.store.by_patient(patient_id).await?)
    }
}
