use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use thiserror::Error;

use apothek_core::MedicineId;

use crate::medicine::{Medicine, MedicineStatus, NewMedicine, UpdateMedicine};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a medicine named '{0}' already exists")]
    DuplicateName(String),

    #[error("medicine not found")]
    NotFound,

    #[error("medicine '{0}' is discontinued")]
    Discontinued(String),

    #[error("catalog state unavailable: {0}")]
    Internal(String),
}

/// In-memory medicine registry with case-insensitive name uniqueness.
#[derive(Debug, Default)]
pub struct MedicineCatalog {
    medicines: RwLock<HashMap<MedicineId, Medicine>>,
}

impl MedicineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new active medicine. Names are unique, case-insensitively.
    pub fn register(&self, input: NewMedicine) -> Result<Medicine, CatalogError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Validation("name cannot be empty".to_string()));
        }

        let mut medicines = self.write_guard()?;
        let needle = name.to_lowercase();
        if medicines.values().any(|m| m.name().to_lowercase() == needle) {
            return Err(CatalogError::DuplicateName(name));
        }

        let medicine = Medicine::new(
            MedicineId::new(),
            name,
            input.unit_price,
            input.low_stock_threshold,
            Utc::now(),
        );
        medicines.insert(medicine.id_typed(), medicine.clone());
        Ok(medicine)
    }

    /// Apply a partial update; renames keep the uniqueness invariant.
    pub fn update(&self, id: MedicineId, update: UpdateMedicine) -> Result<Medicine, CatalogError> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(CatalogError::Validation("name cannot be empty".to_string()));
            }
        }

        let mut medicines = self.write_guard()?;
        if let Some(name) = &update.name {
            let needle = name.trim().to_lowercase();
            if medicines
                .values()
                .any(|m| m.id_typed() != id && m.name().to_lowercase() == needle)
            {
                return Err(CatalogError::DuplicateName(name.trim().to_string()));
            }
        }

        let medicine = medicines.get_mut(&id).ok_or(CatalogError::NotFound)?;
        let update = UpdateMedicine {
            name: update.name.map(|n| n.trim().to_string()),
            ..update
        };
        medicine.apply_update(&update, Utc::now());
        Ok(medicine.clone())
    }

    /// Flip a medicine to discontinued; it stays queryable for history.
    pub fn discontinue(&self, id: MedicineId) -> Result<Medicine, CatalogError> {
        let mut medicines = self.write_guard()?;
        let medicine = medicines.get_mut(&id).ok_or(CatalogError::NotFound)?;
        medicine.discontinue(Utc::now());
        Ok(medicine.clone())
    }

    pub fn get(&self, id: MedicineId) -> Option<Medicine> {
        self.medicines.read().ok()?.get(&id).cloned()
    }

    /// Resolve a medicine for a new prescription line.
    ///
    /// Unknown and discontinued medicines are both unprescribable; the caller
    /// decides how to surface the distinction.
    pub fn resolve_for_prescribing(&self, id: MedicineId) -> Result<Medicine, CatalogError> {
        let medicine = self.get(id).ok_or(CatalogError::NotFound)?;
        if !medicine.can_be_prescribed() {
            return Err(CatalogError::Discontinued(medicine.name().to_string()));
        }
        Ok(medicine)
    }

    /// List medicines, optionally filtered by a case-insensitive name search
    /// and status, ordered by name.
    pub fn list(&self, search: Option<&str>, status: Option<MedicineStatus>) -> Vec<Medicine> {
        let medicines = match self.medicines.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let mut found: Vec<Medicine> = medicines
            .values()
            .filter(|m| status.is_none_or(|s| m.status() == s))
            .filter(|m| {
                needle
                    .as_deref()
                    .is_none_or(|n| m.name().to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        found
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<MedicineId, Medicine>>, CatalogError> {
        self.medicines
            .write()
            .map_err(|_| CatalogError::Internal("lock poisoned".to_string()))
    }
}
