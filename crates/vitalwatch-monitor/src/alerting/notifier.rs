//! Notification channels for care staff.

use async_trait::async_trait;

use crate::domain::{Alert, Severity};

/// Errors raised while delivering a notification
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The channel rejected or lost the notification
    #[error("Delivery over {channel} failed: {reason}")]
    Delivery {
        /// Channel name
        channel: String,
        /// Reason reported by the channel
        reason: String,
    },

    /// The channel did not confirm delivery in time
    #[error("Notification over {channel} timed out after {timeout_ms} ms")]
    Timeout {
        /// Channel name
        channel: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },
}

/// Delivers alerts to care staff
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs
    fn name(&self) -> &str;

    /// Immediate notification for high and critical alerts
    async fn notify_urgent(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Routine notification for medium alerts
    async fn notify_standard(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Notifier that writes alerts to the tracing log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Create a tracing notifier
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn notify_urgent(&self, alert: &Alert) -> Result<(), NotifyError> {
        let marker = match alert.severity() {
            Severity::Critical => "🔴",
            _ => "🟠",
        };
        tracing::warn!(
            alert_id = %alert.id(),
            patient_id = %alert.patient_id(),
            severity = %alert.severity(),
            "{} URGENT: {}",
            marker,
            alert.message()
        );
        Ok(())
    }

    async fn notify_standard(&self, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(
            alert_id = %alert.id(),
            patient_id = %alert.patient_id(),
            severity = %alert.severity(),
            "🟡 {}",
            alert.message()
        );
        Ok(())
    }
}
