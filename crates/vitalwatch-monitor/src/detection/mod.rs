//! Detection context: baselines, anomaly classification and trends.

mod anomaly;
mod baseline;
mod trend;

pub use anomaly::{
    AnomalyConfig, AnomalyDetector, Basis, Evaluation, GuidelineRange, SeverityBreakpoints,
};
pub use baseline::{BaselineConfig, BaselineTracker};
pub use trend::{TrendAnalyzer, TrendSummary};
