//! Vital sign readings produced by sensor devices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PatientId;

/// Category of vital sign carried by a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Heart rate (bpm)
    HeartRate,
    /// Blood pressure, simplified to a single scalar (mmHg)
    BloodPressure,
    /// Peripheral oxygen saturation (%)
    BloodOxygen,
    /// Body temperature (°C)
    Temperature,
    /// Respiratory rate (breaths per minute)
    RespiratoryRate,
    /// Blood glucose (mg/dL)
    BloodGlucose,
    /// Electrocardiogram scalar feature
    Ecg,
    /// Electroencephalogram scalar feature
    Eeg,
}

impl SignalType {
    /// Every signal type, in declaration order
    pub const ALL: [SignalType; 8] = [
        SignalType::HeartRate,
        SignalType::BloodPressure,
        SignalType::BloodOxygen,
        SignalType::Temperature,
        SignalType::RespiratoryRate,
        SignalType::BloodGlucose,
        SignalType::Ecg,
        SignalType::Eeg,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::HeartRate => "heart_rate",
            SignalType::BloodPressure => "blood_pressure",
            SignalType::BloodOxygen => "blood_oxygen",
            SignalType::Temperature => "temperature",
            SignalType::RespiratoryRate => "respiratory_rate",
            SignalType::BloodGlucose => "blood_glucose",
            SignalType::Ecg => "ecg",
            SignalType::Eeg => "eeg",
        }
    }

    /// Human-readable label used in alert messages
    pub fn label(&self) -> &'static str {
        match self {
            SignalType::HeartRate => "heart rate",
            SignalType::BloodPressure => "blood pressure",
            SignalType::BloodOxygen => "blood oxygen",
            SignalType::Temperature => "temperature",
            SignalType::RespiratoryRate => "respiratory rate",
            SignalType::BloodGlucose => "blood glucose",
            SignalType::Ecg => "ECG",
            SignalType::Eeg => "EEG",
        }
    }

    /// Conventional unit for the signal
    pub fn default_unit(&self) -> &'static str {
        match self {
            SignalType::HeartRate => "bpm",
            SignalType::BloodPressure => "mmHg",
            SignalType::BloodOxygen => "%",
            SignalType::Temperature => "°C",
            SignalType::RespiratoryRate => "breaths/min",
            SignalType::BloodGlucose => "mg/dL",
            SignalType::Ecg => "mV",
            SignalType::Eeg => "µV",
        }
    }

    /// Classify a device by its category name.
    ///
    /// Matching is a case-insensitive substring test, checked in order:
    /// heart/pulse, pressure, oxygen/o2, temp. Anything else is `None`.
    pub fn from_device_category(category: &str) -> Option<Self> {
        let category = category.to_lowercase();

        if category.contains("heart") || category.contains("pulse") {
            Some(SignalType::HeartRate)
        } else if category.contains("pressure") {
            Some(SignalType::BloodPressure)
        } else if category.contains("oxygen") || category.contains("o2") {
            Some(SignalType::BloodOxygen)
        } else if category.contains("temp") {
            Some(SignalType::Temperature)
        } else {
            None
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable sample from one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    patient_id: PatientId,
    signal_type: SignalType,
    value: f64,
    unit: String,
    timestamp: DateTime<Utc>,
    source_device_id: String,
}

impl VitalReading {
    /// Create a reading stamped with the current time
    pub fn new(
        patient_id: PatientId,
        signal_type: SignalType,
        value: f64,
        unit: impl Into<String>,
        source_device_id: impl Into<String>,
    ) -> Self {
        Self::at(patient_id, signal_type, value, unit, source_device_id, Utc::now())
    }

    /// Create a reading with an explicit timestamp
    pub fn at(
        patient_id: PatientId,
        signal_type: SignalType,
        value: f64,
        unit: impl Into<String>,
        source_device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            patient_id,
            signal_type,
            value,
            unit: unit.into(),
            timestamp,
            source_device_id: source_device_id.into(),
        }
    }

    /// Patient the reading belongs to
    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    /// Signal type
    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    /// Measured value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit of the measured value
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Acquisition time
    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    /// Device that produced the reading
    pub fn source_device_id(&self) -> &str {
        &self.source_device_id
    }

    /// Whether the reading belongs to the given patient and signal type
    pub fn matches(&self, patient_id: &PatientId, signal_type: SignalType) -> bool {
        &self.patient_id == patient_id && self.signal_type == signal_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_device_categories() {
        assert_eq!(SignalType::from_device_category("Heart Rate Monitor"), Some(SignalType::HeartRate));
        assert_eq!(SignalType::from_device_category("Pulse Oximeter"), Some(SignalType::HeartRate));
        assert_eq!(SignalType::from_device_category("BP Pressure Cuff"), Some(SignalType::BloodPressure));
        assert_eq!(SignalType::from_device_category("Oxygen Saturation"), Some(SignalType::BloodOxygen));
        assert_eq!(SignalType::from_device_category("SpO2 sensor"), Some(SignalType::BloodOxygen));
        assert_eq!(SignalType::from_device_category("TEMPERATURE patch"), Some(SignalType::Temperature));
        assert_eq!(SignalType::from_device_category("Infusion pump"), None);
    }

    #[test]
    fn reading_matches_only_its_patient_and_type() {
        let patient = PatientId::new();
        let reading = VitalReading::new(patient.clone(), SignalType::HeartRate, 72.0, "bpm", "hr-1");

        assert!(reading.matches(&patient, SignalType::HeartRate));
        assert!(!reading.matches(&patient, SignalType::Temperature));
        assert!(!reading.matches(&PatientId::new(), SignalType::HeartRate));
    }

    #[test]
    fn signal_type_serializes_snake_case() {
        let json = serde_json::to_string(&SignalType::BloodOxygen).unwrap();
        assert_eq!(json, "\"blood_oxygen\"");
        assert_eq!(SignalType::RespiratoryRate.to_string(), "respiratory_rate");
    }
}
