//! Patient context owned by the external patient directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a patient
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(Uuid);

impl PatientId {
    /// Create a new random patient ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PatientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A medication the patient is currently taking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    /// Drug name
    pub name: String,
    /// Dose, e.g. "5 mg"
    pub dosage: String,
    /// Frequency, e.g. "twice daily"
    pub frequency: String,
    /// When the course started
    pub start_date: Option<DateTime<Utc>>,
    /// When the course ends, if scheduled
    pub end_date: Option<DateTime<Utc>>,
}

impl Medication {
    /// Create a medication entry without dates
    pub fn new(
        name: impl Into<String>,
        dosage: impl Into<String>,
        frequency: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency: frequency.into(),
            start_date: None,
            end_date: None,
        }
    }
}

/// Person to contact in an emergency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    /// Contact name
    pub name: String,
    /// Relationship to the patient
    pub relationship: String,
    /// Phone number
    pub phone: String,
}

/// Read-only patient context used by the decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Patient identifier
    pub id: PatientId,
    /// Full name
    pub name: String,
    /// Age in years
    pub age: u32,
    /// Gender as recorded by the directory
    pub gender: String,
    /// Free-text medical history
    pub medical_history: String,
    /// Active medications
    pub current_medications: Vec<Medication>,
    /// Additional demographic attributes
    pub demographics: HashMap<String, String>,
    /// Emergency contact, if recorded
    pub emergency_contact: Option<EmergencyContact>,
}

impl Patient {
    /// Create a patient with empty history and no medications
    pub fn new(id: PatientId, name: impl Into<String>, age: u32, gender: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            age,
            gender: gender.into(),
            medical_history: String::new(),
            current_medications: Vec::new(),
            demographics: HashMap::new(),
            emergency_contact: None,
        }
    }

    /// Set the medical history
    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.medical_history = history.into();
        self
    }

    /// Add a current medication
    pub fn with_medication(mut self, medication: Medication) -> Self {
        self.current_medications.push(medication);
        self
    }

    /// Set the emergency contact
    pub fn with_emergency_contact(mut self, contact: EmergencyContact) -> Self {
        self.emergency_contact = Some(contact);
        self
    }
}
