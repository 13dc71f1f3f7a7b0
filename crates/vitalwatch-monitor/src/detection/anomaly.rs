//! Baseline-relative and guideline-based anomaly detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::{Alert, AlertSource, Baseline, Severity, SignalType, VitalReading};

/// Baselines with an absolute value below this are treated as absent
const MIN_BASELINE_MAGNITUDE: f64 = 1e-9;

/// Inclusive normal range for one signal type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuidelineRange {
    /// Lowest normal value
    pub min: f64,
    /// Highest normal value
    pub max: f64,
}

impl GuidelineRange {
    /// Create a range
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the range, bounds included
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Distance outside the range relative to the violated bound.
    ///
    /// Zero inside the range.
    pub fn excursion(&self, value: f64) -> f64 {
        let (distance, bound) = if value < self.min {
            (self.min - value, self.min)
        } else if value > self.max {
            (value - self.max, self.max)
        } else {
            return 0.0;
        };

        if bound.abs() < MIN_BASELINE_MAGNITUDE {
            distance
        } else {
            distance / bound.abs()
        }
    }
}

/// Magnitude thresholds at which severity steps up.
///
/// Magnitudes below `medium` map to low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBreakpoints {
    /// Lower edge of medium
    pub medium: f64,
    /// Lower edge of high
    pub high: f64,
    /// Lower edge of critical
    pub critical: f64,
}

impl SeverityBreakpoints {
    /// Create breakpoints
    pub const fn new(medium: f64, high: f64, critical: f64) -> Self {
        Self {
            medium,
            high,
            critical,
        }
    }

    /// Default table for relative deviation from a baseline
    pub const fn baseline_default() -> Self {
        Self::new(0.20, 0.35, 0.50)
    }

    /// Default table for excursion outside a guideline range
    pub const fn guideline_default() -> Self {
        Self::new(0.10, 0.25, 0.40)
    }

    /// Map a magnitude to a severity
    pub fn classify(&self, magnitude: f64) -> Severity {
        if magnitude >= self.critical {
            Severity::Critical
        } else if magnitude >= self.high {
            Severity::High
        } else if magnitude >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Check the table is finite, non-negative and ordered
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let values = [self.medium, self.high, self.critical];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "{name} breakpoints must be finite and non-negative"
            )));
        }
        if !(self.medium <= self.high && self.high <= self.critical) {
            return Err(ConfigError::Invalid(format!(
                "{name} breakpoints must satisfy medium <= high <= critical, got {} / {} / {}",
                self.medium, self.high, self.critical
            )));
        }
        Ok(())
    }
}

/// Configuration for anomaly detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Relative deviation above which a reading is anomalous
    pub deviation_threshold: f64,
    /// Normal ranges used when no baseline exists
    pub guidelines: BTreeMap<SignalType, GuidelineRange>,
    /// Severity table for baseline deviation
    pub baseline_breakpoints: SeverityBreakpoints,
    /// Severity table for guideline excursion
    pub guideline_breakpoints: SeverityBreakpoints,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        let mut guidelines = BTreeMap::new();
        guidelines.insert(SignalType::HeartRate, GuidelineRange::new(50.0, 120.0));
        guidelines.insert(SignalType::BloodPressure, GuidelineRange::new(90.0, 140.0));
        guidelines.insert(SignalType::Temperature, GuidelineRange::new(36.0, 38.0));

        Self {
            deviation_threshold: 0.20,
            guidelines,
            baseline_breakpoints: SeverityBreakpoints::baseline_default(),
            guideline_breakpoints: SeverityBreakpoints::guideline_default(),
        }
    }
}

impl AnomalyConfig {
    /// Validate thresholds, ranges and breakpoint tables
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.deviation_threshold.is_finite() || self.deviation_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "deviation_threshold must be positive, got {}",
                self.deviation_threshold
            )));
        }
        for (signal, range) in &self.guidelines {
            if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
                return Err(ConfigError::Invalid(format!(
                    "guideline range for {signal} is invalid: [{}, {}]",
                    range.min, range.max
                )));
            }
        }
        self.baseline_breakpoints.validate("baseline")?;
        self.guideline_breakpoints.validate("guideline")?;
        Ok(())
    }
}

/// What an evaluation was judged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// Relative deviation from the patient's baseline
    Baseline,
    /// Fixed guideline range
    Guideline,
    /// No baseline and no guideline for this signal type
    InsufficientRule,
}

/// Result of evaluating one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Whether the reading is abnormal
    pub is_anomalous: bool,
    /// Severity derived from the magnitude
    pub severity: Severity,
    /// Relative deviation or guideline excursion
    pub magnitude: f64,
    /// Rule the reading was judged by
    pub basis: Basis,
}

impl Evaluation {
    fn normal(basis: Basis, magnitude: f64) -> Self {
        Self {
            is_anomalous: false,
            severity: Severity::Low,
            magnitude,
            basis,
        }
    }
}

/// Classifies readings as normal or anomalous
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A baseline of (near) zero carries no relative scale
fn usable(baseline: Option<&Baseline>) -> Option<&Baseline> {
    baseline.filter(|b| b.value().abs() >= MIN_BASELINE_MAGNITUDE)
}

impl AnomalyDetector {
    /// Create a detector
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(AnomalyConfig::default())
    }

    /// Get configuration
    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Evaluate a reading against its baseline, or the guidelines if there is none.
    ///
    /// A baseline of (near) zero has no meaningful relative deviation and is
    /// treated as absent.
    pub fn evaluate(&self, reading: &VitalReading, baseline: Option<&Baseline>) -> Evaluation {
        let value = reading.value();

        match usable(baseline) {
            Some(baseline) => {
                let deviation = (value - baseline.value()).abs() / baseline.value().abs();
                if deviation > self.config.deviation_threshold {
                    Evaluation {
                        is_anomalous: true,
                        severity: self.config.baseline_breakpoints.classify(deviation),
                        magnitude: deviation,
                        basis: Basis::Baseline,
                    }
                } else {
                    Evaluation::normal(Basis::Baseline, deviation)
                }
            }
            None => self.evaluate_guideline(reading.signal_type(), value),
        }
    }

    fn evaluate_guideline(&self, signal_type: SignalType, value: f64) -> Evaluation {
        let Some(range) = self.config.guidelines.get(&signal_type) else {
            return Evaluation::normal(Basis::InsufficientRule, 0.0);
        };

        if range.contains(value) {
            return Evaluation::normal(Basis::Guideline, 0.0);
        }

        let excursion = range.excursion(value);
        Evaluation {
            is_anomalous: true,
            severity: self.config.guideline_breakpoints.classify(excursion),
            magnitude: excursion,
            basis: Basis::Guideline,
        }
    }

    /// Whether the reading is anomalous
    pub fn is_anomalous(&self, reading: &VitalReading, baseline: Option<&Baseline>) -> bool {
        self.evaluate(reading, baseline).is_anomalous
    }

    /// Human-readable description of an abnormal reading
    pub fn message(&self, reading: &VitalReading, baseline: Option<&Baseline>) -> String {
        let context = match usable(baseline) {
            Some(b) => format!("baseline {:.1} {}", b.value(), reading.unit()),
            None => "no established baseline".to_string(),
        };
        format!(
            "Abnormal {} reading: {:.1} {} ({})",
            reading.signal_type().label(),
            reading.value(),
            reading.unit(),
            context
        )
    }

    /// Build detector alerts for every anomalous reading.
    ///
    /// Each reading is matched to the baseline for its own patient and
    /// signal type.
    pub fn detect(&self, readings: &[VitalReading], baselines: &[Baseline]) -> Vec<Alert> {
        readings
            .iter()
            .filter_map(|reading| {
                let baseline = baselines
                    .iter()
                    .find(|b| reading.matches(b.patient_id(), b.signal_type()));
                let evaluation = self.evaluate(reading, baseline);
                evaluation.is_anomalous.then(|| {
                    Alert::new(
                        reading.patient_id().clone(),
                        evaluation.severity,
                        self.message(reading, baseline),
                        Some(reading.clone()),
                        AlertSource::Detector,
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatientId;

    fn hr(patient: &PatientId, value: f64) -> VitalReading {
        VitalReading::new(patient.clone(), SignalType::HeartRate, value, "bpm", "hr-1")
    }

    fn baseline(patient: &PatientId, value: f64) -> Baseline {
        Baseline::new(patient.clone(), SignalType::HeartRate, value, 10)
    }

    #[test]
    fn test_baseline_deviation_threshold() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();
        let b = baseline(&patient, 75.0);

        let high = detector.evaluate(&hr(&patient, 92.0), Some(&b));
        assert!(high.is_anomalous);
        assert!((high.magnitude - 17.0 / 75.0).abs() < 1e-9);
        assert!(high.severity >= Severity::Medium);
        assert_eq!(high.basis, Basis::Baseline);

        assert!(!detector.is_anomalous(&hr(&patient, 88.0), Some(&b)));
    }

    #[test]
    fn test_exact_threshold_is_not_anomalous() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();
        let b = baseline(&patient, 100.0);

        assert!(!detector.is_anomalous(&hr(&patient, 120.0), Some(&b)));
        assert!(!detector.is_anomalous(&hr(&patient, 80.0), Some(&b)));
        assert!(detector.is_anomalous(&hr(&patient, 120.5), Some(&b)));
    }

    #[test]
    fn test_guideline_without_baseline() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();

        let low = detector.evaluate(&hr(&patient, 45.0), None);
        assert!(low.is_anomalous);
        assert_eq!(low.basis, Basis::Guideline);

        assert!(!detector.is_anomalous(&hr(&patient, 60.0), None));
        assert!(!detector.is_anomalous(&hr(&patient, 50.0), None));
        assert!(!detector.is_anomalous(&hr(&patient, 120.0), None));
        assert!(detector.is_anomalous(&hr(&patient, 120.1), None));
    }

    #[test]
    fn test_unlisted_signal_is_never_flagged() {
        let detector = AnomalyDetector::with_defaults();
        let reading = VitalReading::new(PatientId::new(), SignalType::BloodGlucose, 400.0, "mg/dL", "g-1");

        let evaluation = detector.evaluate(&reading, None);
        assert!(!evaluation.is_anomalous);
        assert_eq!(evaluation.basis, Basis::InsufficientRule);
    }

    #[test]
    fn test_zero_baseline_falls_back_to_guideline() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();
        let zero = baseline(&patient, 0.0);

        let evaluation = detector.evaluate(&hr(&patient, 70.0), Some(&zero));
        assert!(!evaluation.is_anomalous);
        assert_eq!(evaluation.basis, Basis::Guideline);
        assert!(detector.is_anomalous(&hr(&patient, 30.0), Some(&zero)));

        // Message agrees with the rule that judged the reading
        let message = detector.message(&hr(&patient, 30.0), Some(&zero));
        assert!(message.contains("no established baseline"));
        assert!(!message.contains("baseline 0.0"));
    }

    #[test]
    fn test_severity_is_monotonic() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();
        let b = baseline(&patient, 100.0);

        let mut previous = Severity::Low;
        for value in (100..=200).map(f64::from) {
            let severity = detector.evaluate(&hr(&patient, value), Some(&b)).severity;
            assert!(severity >= previous, "severity dropped at {value}");
            previous = severity;
        }
        assert_eq!(previous, Severity::Critical);
    }

    #[test]
    fn test_message_names_signal_and_baseline() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();
        let reading = hr(&patient, 92.0);

        let with = detector.message(&reading, Some(&baseline(&patient, 75.0)));
        assert!(with.contains("heart rate"));
        assert!(with.contains("92.0 bpm"));
        assert!(with.contains("baseline 75.0"));

        let without = detector.message(&reading, None);
        assert!(without.contains("no established baseline"));
    }

    #[test]
    fn test_detect_builds_detector_alerts() {
        let detector = AnomalyDetector::with_defaults();
        let patient = PatientId::new();
        let baselines = vec![baseline(&patient, 75.0)];
        let readings = vec![hr(&patient, 76.0), hr(&patient, 130.0)];

        let alerts = detector.detect(&readings, &baselines);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source(), AlertSource::Detector);
        assert_eq!(alerts[0].severity(), Severity::Critical);
        assert_eq!(alerts[0].triggering_reading().map(|r| r.value()), Some(130.0));
    }

    #[test]
    fn test_breakpoint_validation() {
        let mut config = AnomalyConfig::default();
        assert!(config.validate().is_ok());

        config.guideline_breakpoints = SeverityBreakpoints::new(0.3, 0.2, 0.4);
        assert!(config.validate().is_err());
    }
}
