//! Alerting module for care-staff notifications.

mod dispatcher;
mod notifier;

pub use dispatcher::{AlertDispatcher, DispatchConfig, DispatchOutcome};
pub use notifier::{Notifier, NotifyError, TracingNotifier};
