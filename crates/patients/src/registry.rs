use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use apothek_core::PatientId;

/// Result cap for a normal search.
pub const SEARCH_LIMIT: usize = 20;
/// Result cap when the caller asks for the full listing.
pub const LOAD_ALL_LIMIT: usize = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatientError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a patient with medical record number '{0}' already exists")]
    DuplicateMrn(String),

    #[error("patient not found")]
    NotFound,

    #[error("registry state unavailable: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: PatientId,
    pub full_name: String,
    /// Medical record number, unique within the registry.
    pub mrn: String,
    pub contact_number: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub full_name: String,
    pub mrn: String,
    pub contact_number: Option<String>,
}

/// In-memory patient lookup with MRN uniqueness and capped search.
#[derive(Debug, Default)]
pub struct PatientRegistry {
    patients: RwLock<HashMap<PatientId, Patient>>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, input: NewPatient) -> Result<Patient, PatientError> {
        let full_name = input.full_name.trim().to_string();
        let mrn = input.mrn.trim().to_string();
        if full_name.is_empty() {
            return Err(PatientError::Validation("patient name must not be empty".to_string()));
        }
        if mrn.is_empty() {
            return Err(PatientError::Validation(
                "medical record number must not be empty".to_string(),
            ));
        }

        let mut patients = self.write_guard()?;
        if patients.values().any(|p| p.mrn.eq_ignore_ascii_case(&mrn)) {
            return Err(PatientError::DuplicateMrn(mrn));
        }

        let patient = Patient {
            id: PatientId::new(),
            full_name,
            mrn,
            contact_number: input.contact_number,
            registered_at: Utc::now(),
        };
        tracing::info!(patient_id = %patient.id, mrn = patient.mrn, "patient registered");
        patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    pub fn get(&self, id: PatientId) -> Option<Patient> {
        self.patients
            .read()
            .ok()
            .and_then(|patients| patients.get(&id).cloned())
    }

    pub fn exists(&self, id: PatientId) -> bool {
        self.get(id).is_some()
    }

    /// Case-insensitive search across name, MRN and contact number.
    ///
    /// An empty query with `load_all` lists up to `LOAD_ALL_LIMIT` patients;
    /// otherwise results are capped at `SEARCH_LIMIT`.
    pub fn search(&self, query: &str, load_all: bool) -> Vec<Patient> {
        let Ok(patients) = self.patients.read() else {
            return Vec::new();
        };

        let needle = query.trim().to_lowercase();
        let mut matched: Vec<Patient> = patients
            .values()
            .filter(|p| {
                needle.is_empty()
                    || p.full_name.to_lowercase().contains(&needle)
                    || p.mrn.to_lowercase().contains(&needle)
                    || p.contact_number
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()));
        let cap = if load_all { LOAD_ALL_LIMIT } else { SEARCH_LIMIT };
        matched.truncate(cap);
        matched
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PatientId, Patient>>, PatientError> {
        self.patients
            .write()
            .map_err(|_| PatientError::Internal("registry lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(name: &str, mrn: &str) -> NewPatient {
        NewPatient {
            full_name: name.to_string(),
            mrn: mrn.to_string(),
            contact_number: Some("030 555 0100".to_string()),
        }
    }

    #[test]
    fn register_enforces_unique_mrn() {
        let registry = PatientRegistry::new();
        registry.register(patient("Ada Krause", "MRN-001")).unwrap();
        let err = registry.register(patient("Ben Vogel", "mrn-001")).unwrap_err();
        assert_eq!(err, PatientError::DuplicateMrn("mrn-001".to_string()));
    }

    #[test]
    fn search_matches_name_mrn_and_contact() {
        let registry = PatientRegistry::new();
        registry.register(patient("Ada Krause", "MRN-001")).unwrap();
        registry
            .register(NewPatient {
                full_name: "Ben Vogel".to_string(),
                mrn: "MRN-002".to_string(),
                contact_number: Some("0171 99 88".to_string()),
            })
            .unwrap();

        assert_eq!(registry.search("krause", false).len(), 1);
        assert_eq!(registry.search("MRN-002", false).len(), 1);
        assert_eq!(registry.search("99 88", false).len(), 1);
        assert_eq!(registry.search("nobody", false).len(), 0);
    }

    #[test]
    fn search_results_are_capped() {
        let registry = PatientRegistry::new();
        for i in 0..60 {
            registry
                .register(patient(&format!("Patient {i:02}"), &format!("MRN-{i:03}")))
                .unwrap();
        }

        assert_eq!(registry.search("patient", false).len(), SEARCH_LIMIT);
        assert_eq!(registry.search("", true).len(), LOAD_ALL_LIMIT);
        // Empty query without load_all still honors the tighter cap.
        assert_eq!(registry.search("", false).len(), SEARCH_LIMIT);
    }

    #[test]
    fn search_orders_by_name() {
        let registry = PatientRegistry::new();
        registry.register(patient("Zoe Lang", "MRN-9")).unwrap();
        registry.register(patient("ada krause", "MRN-8")).unwrap();

        let results = registry.search("", true);
        assert_eq!(results[0].full_name, "ada krause");
        assert_eq!(results[1].full_name, "Zoe Lang");
    }
}
