//! One patient's monitoring cycle.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;

use super::events::{CycleReport, MonitorEvent};
use super::supervisor::Shared;
use crate::decision::{AnomalySummary, DecisionContext};
use crate::domain::{
    Alert, AlertSource, Decision, DecisionType, Patient, PatientId, Severity, SignalType, VitalReading,
};
use crate::integration::{DeviceError, SensorDevice};

/// What evaluation of one cycle's readings produced
struct EvaluationOutcome {
    anomalies: Vec<AnomalySummary>,
    /// Most severe anomalous reading
    worst: Option<(Severity, VitalReading)>,
    /// Highest severity of the detector alerts actually dispatched
    paged: Option<Severity>,
}

/// Per-patient state carried between cycles.
///
/// Guarded by an async mutex so cycles for one patient never overlap.
pub(crate) struct PatientMonitor {
    patient: Patient,
    retry_queue: VecDeque<VitalReading>,
    interval: Duration,
}

impl PatientMonitor {
    pub(crate) fn new(patient: Patient, interval: Duration) -> Self {
        Self {
            patient,
            retry_queue: VecDeque::new(),
            interval,
        }
    }

    pub(crate) fn patient_id(&self) -> &PatientId {
        &self.patient.id
    }

    /// Pause before the next cycle
    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn queued(&self) -> usize {
        self.retry_queue.len()
    }

    /// Run one full cycle. Failures are logged and never abort the cycle.
    #[tracing::instrument(skip(self, shared), fields(patient_id = %self.patient.id))]
    pub(crate) async fn run_cycle(&mut self, shared: &Shared) -> CycleReport {
        let mut report = CycleReport {
            readings_persisted: self.retry_pending(shared).await,
            ..CycleReport::default()
        };

        // Baselines reflect history up to the previous cycle
        self.refresh_baselines_if_due(shared).await;

        let readings = self.poll_devices(shared, &mut report).await;
        report.readings_collected = readings.len();

        for reading in &readings {
            match shared.readings.append(reading).await {
                Ok(()) => report.readings_persisted += 1,
                Err(e) => {
                    tracing::warn!(error = %e, signal = %reading.signal_type(), "Reading not persisted, queued for retry");
                    self.enqueue_retry(reading.clone(), shared.config.retry_buffer_capacity);
                }
            }
        }

        let outcome = self.evaluate(shared, &readings, &mut report).await;

        let decision = self.decide(shared, outcome.anomalies).await;
        self.apply_decision(shared, &decision, outcome.worst, outcome.paged, &mut report)
            .await;
        report.decision = Some(decision);
        report.readings_queued = self.retry_queue.len();
        report.next_interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);

        tracing::debug!(
            collected = report.readings_collected,
            persisted = report.readings_persisted,
            alerts = report.alerts_dispatched,
            "Cycle complete"
        );
        shared.publish(MonitorEvent::CycleCompleted {
            patient_id: self.patient.id.clone(),
            report: report.clone(),
        });
        report
    }

    /// Write queued readings in order, stopping at the first failure
    async fn retry_pending(&mut self, shared: &Shared) -> usize {
        let mut persisted = 0;
        while let Some(reading) = self.retry_queue.pop_front() {
            if let Err(e) = shared.readings.append(&reading).await {
                tracing::debug!(error = %e, queued = self.retry_queue.len() + 1, "Retry deferred");
                self.retry_queue.push_front(reading);
                break;
            }
            persisted += 1;
        }
        if persisted > 0 {
            tracing::info!(persisted, "Queued readings persisted");
        }
        persisted
    }

    /// Last attempt to persist queued readings before the task exits
    pub(crate) async fn flush(&mut self, shared: &Shared) -> usize {
        let persisted = self.retry_pending(shared).await;
        if !self.retry_queue.is_empty() {
            tracing::warn!(
                patient_id = %self.patient.id,
                lost = self.retry_queue.len(),
                "Readings could not be persisted before shutdown"
            );
        }
        persisted
    }

    fn enqueue_retry(&mut self, reading: VitalReading, capacity: usize) {
        if self.retry_queue.len() >= capacity {
            if let Some(dropped) = self.retry_queue.pop_front() {
                tracing::warn!(
                    signal = %dropped.signal_type(),
                    timestamp = %dropped.timestamp(),
                    "Retry buffer full, dropping oldest reading"
                );
            }
        }
        self.retry_queue.push_back(reading);
    }

    async fn poll_devices(&self, shared: &Shared, report: &mut CycleReport) -> Vec<VitalReading> {
        let mut readings = Vec::new();

        for device in &shared.devices {
            if !device.is_connected() {
                continue;
            }
            if device.assigned_patient().is_some_and(|p| p != &self.patient.id) {
                continue;
            }
            let Some(signal_type) = SignalType::from_device_category(device.category()) else {
                tracing::trace!(device_id = %device.id(), category = %device.category(), "Unrecognised device category");
                continue;
            };

            match self.read_device(shared, device.as_ref(), signal_type).await {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    report.device_failures += 1;
                    tracing::warn!(device_id = %device.id(), error = %e, "Device read failed");
                    shared.publish(MonitorEvent::DeviceFailure {
                        patient_id: Some(self.patient.id.clone()),
                        device_id: device.id().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        readings
    }

    async fn read_device(
        &self,
        shared: &Shared,
        device: &dyn SensorDevice,
        signal_type: SignalType,
    ) -> Result<VitalReading, DeviceError> {
        let timeout = shared.config.device_read_timeout();
        let reading = tokio::time::timeout(timeout, device.take_reading(&self.patient.id, signal_type))
            .await
            .map_err(|_| DeviceError::Timeout {
                device_id: device.id().to_string(),
                timeout_ms: shared.config.device_read_timeout_ms,
            })??;

        if !reading.matches(&self.patient.id, signal_type) {
            return Err(DeviceError::MismatchedReading {
                device_id: device.id().to_string(),
                expected: format!("{} for {}", signal_type, self.patient.id),
                actual: format!("{} for {}", reading.signal_type(), reading.patient_id()),
            });
        }
        if !reading.value().is_finite() {
            return Err(DeviceError::NonFiniteValue {
                device_id: device.id().to_string(),
                signal_type,
                value: reading.value(),
            });
        }
        Ok(reading)
    }

    async fn refresh_baselines_if_due(&self, shared: &Shared) {
        if !shared.tracker.is_refresh_due(&self.patient.id, Utc::now()) {
            return;
        }
        match shared.tracker.refresh_patient(&self.patient.id).await {
            Ok(established) => tracing::debug!(established, "Baselines refreshed"),
            Err(e) => tracing::warn!(error = %e, "Baseline refresh failed"),
        }
    }

    /// Evaluate fresh readings and dispatch detector alerts
    async fn evaluate(
        &self,
        shared: &Shared,
        readings: &[VitalReading],
        report: &mut CycleReport,
    ) -> EvaluationOutcome {
        let mut anomalies = Vec::new();
        let mut worst: Option<(Severity, VitalReading)> = None;
        let mut paged: Option<Severity> = None;

        for reading in readings {
            let baseline = shared.tracker.baseline(&self.patient.id, reading.signal_type());
            let evaluation = shared.detector.evaluate(reading, baseline.as_ref());
            if !evaluation.is_anomalous {
                continue;
            }

            anomalies.push(AnomalySummary {
                signal_type: reading.signal_type(),
                value: reading.value(),
                severity: evaluation.severity,
                magnitude: evaluation.magnitude,
                basis: evaluation.basis,
            });
            if worst.as_ref().map_or(true, |(s, _)| evaluation.severity > *s) {
                worst = Some((evaluation.severity, reading.clone()));
            }

            let alert = Alert::new(
                self.patient.id.clone(),
                evaluation.severity,
                shared.detector.message(reading, baseline.as_ref()),
                Some(reading.clone()),
                AlertSource::Detector,
            );
            if self.dispatch(shared, alert).await {
                report.alerts_dispatched += 1;
                paged = paged.max(Some(evaluation.severity));
            }
        }

        EvaluationOutcome {
            anomalies,
            worst,
            paged,
        }
    }

    async fn decide(&self, shared: &Shared, anomalies: Vec<AnomalySummary>) -> Decision {
        let window = shared.engine.config().recent_window_minutes;
        let recent = match shared.readings.query_by_patient(&self.patient.id, window).await {
            Ok(recent) => recent,
            Err(e) => {
                tracing::warn!(error = %e, "Recent readings unavailable, deciding on queued readings only");
                self.retry_queue.iter().cloned().collect()
            }
        };

        let recent_anomaly_count = recent
            .iter()
            .filter(|r| {
                let baseline = shared.tracker.baseline(&self.patient.id, r.signal_type());
                shared.detector.is_anomalous(r, baseline.as_ref())
            })
            .count();

        let context = DecisionContext {
            anomalies,
            recent_anomaly_count,
            attributes: Default::default(),
        };
        let decision = shared.engine.decide(&self.patient, &recent, &context).await;
        let decision = match decision.decision_type() {
            DecisionType::Alert if decision.severity_hint().is_none() => {
                let severity = context.highest_severity().unwrap_or(Severity::Medium);
                decision.with_severity_hint(Some(severity))
            }
            _ => decision,
        };

        shared.publish(MonitorEvent::DecisionMade {
            patient_id: self.patient.id.clone(),
            decision: decision.clone(),
        });
        decision
    }

    async fn apply_decision(
        &mut self,
        shared: &Shared,
        decision: &Decision,
        worst: Option<(Severity, VitalReading)>,
        paged: Option<Severity>,
        report: &mut CycleReport,
    ) {
        match decision.decision_type() {
            DecisionType::Alert => {
                let severity = decision.severity_hint().unwrap_or(Severity::Medium);
                if paged.is_some_and(|p| p >= severity) {
                    tracing::debug!(%severity, "Decision alert covered by a detector alert this cycle");
                    return;
                }
                let alert = Alert::new(
                    self.patient.id.clone(),
                    severity,
                    decision.description(),
                    worst.map(|(_, reading)| reading),
                    AlertSource::DecisionEngine,
                );
                if self.dispatch(shared, alert).await {
                    report.alerts_dispatched += 1;
                }
            }
            DecisionType::AdjustMonitoring => {
                let adjusted = shared.config.adjusted_interval();
                if self.interval != adjusted {
                    tracing::info!(interval_ms = shared.config.adjusted_interval_ms, "Monitoring interval tightened");
                }
                self.interval = adjusted;
            }
            DecisionType::RecommendIntervention => {
                tracing::warn!(
                    confidence = decision.confidence(),
                    "Intervention recommended: {}",
                    decision.description()
                );
                shared.publish(MonitorEvent::InterventionRecommended {
                    patient_id: self.patient.id.clone(),
                    description: decision.description().to_string(),
                });
            }
            DecisionType::NoAction => {
                self.interval = shared.config.monitoring_interval();
            }
        }
    }

    async fn dispatch(&self, shared: &Shared, alert: Alert) -> bool {
        let alert_id = alert.id().clone();
        let severity = alert.severity();
        let source = alert.source();

        match shared.dispatcher.handle(alert).await {
            Ok(_) => {
                shared.publish(MonitorEvent::AlertDispatched {
                    patient_id: self.patient.id.clone(),
                    alert_id,
                    severity,
                    source,
                });
                true
            }
            Err(e) => {
                if severity.is_urgent() {
                    tracing::error!(alert_id = %alert_id, %severity, error = %e, "Urgent alert dispatch failed");
                } else {
                    tracing::warn!(alert_id = %alert_id, %severity, error = %e, "Alert dispatch failed");
                }
                shared.publish(MonitorEvent::AlertDispatchFailed {
                    patient_id: self.patient.id.clone(),
                    alert_id,
                    severity,
                    source,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
