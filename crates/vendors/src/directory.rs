use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use apothek_core::VendorId;

use crate::vendor::{NewVendor, UpdateVendor, Vendor, VendorStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VendorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("a vendor named '{0}' already exists")]
    DuplicateName(String),

    #[error("vendor not found")]
    NotFound,

    #[error("directory state unavailable: {0}")]
    Internal(String),
}

/// Outcome of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorDeletion {
    /// The vendor had ledger history and was deactivated instead.
    Deactivated(Vendor),
    /// No history referenced the vendor; the record is gone.
    Removed,
}

/// In-memory vendor directory with case-insensitive name uniqueness.
#[derive(Debug, Default)]
pub struct VendorDirectory {
    vendors: RwLock<HashMap<VendorId, Vendor>>,
}

impl VendorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, input: NewVendor) -> Result<Vendor, VendorError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(VendorError::Validation("vendor name must not be empty".to_string()));
        }

        let mut vendors = self.write_guard()?;
        if vendors
            .values()
            .any(|v| v.name().eq_ignore_ascii_case(&name))
        {
            return Err(VendorError::DuplicateName(name));
        }

        let vendor = Vendor::new(name, input.contact);
        tracing::info!(vendor_id = %vendor.id_typed(), name = vendor.name(), "vendor registered");
        vendors.insert(vendor.id_typed(), vendor.clone());
        Ok(vendor)
    }

    pub fn update(&self, id: VendorId, update: UpdateVendor) -> Result<Vendor, VendorError> {
        let mut vendors = self.write_guard()?;

        if let Some(name) = update.name.as_deref() {
            let name = name.trim();
            if name.is_empty() {
                return Err(VendorError::Validation("vendor name must not be empty".to_string()));
            }
            if vendors
                .values()
                .any(|v| v.id_typed() != id && v.name().eq_ignore_ascii_case(name))
            {
                return Err(VendorError::DuplicateName(name.to_string()));
            }
        }

        let vendor = vendors.get_mut(&id).ok_or(VendorError::NotFound)?;
        let update = UpdateVendor {
            name: update.name.map(|n| n.trim().to_string()),
            contact: update.contact,
        };
        vendor.apply_update(update);
        Ok(vendor.clone())
    }

    pub fn get(&self, id: VendorId) -> Option<Vendor> {
        self.vendors
            .read()
            .ok()
            .and_then(|vendors| vendors.get(&id).cloned())
    }

    /// Delete a vendor. The caller decides `has_history` by asking the stock
    /// ledger; with history the vendor is only deactivated so old receipts
    /// keep resolving.
    pub fn delete(&self, id: VendorId, has_history: bool) -> Result<VendorDeletion, VendorError> {
        let mut vendors = self.write_guard()?;
        if has_history {
            let vendor = vendors.get_mut(&id).ok_or(VendorError::NotFound)?;
            vendor.deactivate();
            tracing::info!(vendor_id = %id, "vendor deactivated (ledger history present)");
            Ok(VendorDeletion::Deactivated(vendor.clone()))
        } else {
            vendors.remove(&id).ok_or(VendorError::NotFound)?;
            tracing::info!(vendor_id = %id, "vendor removed");
            Ok(VendorDeletion::Removed)
        }
    }

    /// Vendors matching an optional search term (name or any contact field,
    /// case-insensitive) and status filter, ordered by name.
    pub fn list(&self, search: Option<&str>, status: Option<VendorStatus>) -> Vec<Vendor> {
        let Ok(vendors) = self.vendors.read() else {
            return Vec::new();
        };

        let mut matched: Vec<Vendor> = vendors
            .values()
            .filter(|v| status.is_none_or(|s| v.status() == s))
            .filter(|v| {
                search.is_none_or(|needle| {
                    v.name().to_lowercase().contains(&needle.to_lowercase())
                        || v.contact().matches(needle)
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        matched
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<VendorId, Vendor>>, VendorError> {
        self.vendors
            .write()
            .map_err(|_| VendorError::Internal("directory lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::ContactInfo;

    fn new_vendor(name: &str) -> NewVendor {
        NewVendor {
            name: name.to_string(),
            contact: ContactInfo {
                email: Some(format!("{}@example.com", name.replace(' ', "."))),
                phone: Some("+49 30 1234".to_string()),
                address: None,
            },
        }
    }

    #[test]
    fn create_rejects_duplicate_names_case_insensitively() {
        let directory = VendorDirectory::new();
        directory.create(new_vendor("Bayer Distribution")).unwrap();
        let err = directory
            .create(new_vendor("bayer distribution"))
            .unwrap_err();
        assert_eq!(err, VendorError::DuplicateName("bayer distribution".to_string()));
    }

    #[test]
    fn update_changes_only_provided_fields() {
        let directory = VendorDirectory::new();
        let vendor = directory.create(new_vendor("Hexal")).unwrap();

        let updated = directory
            .update(
                vendor.id_typed(),
                UpdateVendor {
                    name: Some("Hexal AG".to_string()),
                    contact: None,
                },
            )
            .unwrap();
        assert_eq!(updated.name(), "Hexal AG");
        assert_eq!(updated.contact(), vendor.contact());
    }

    #[test]
    fn delete_without_history_removes_the_record() {
        let directory = VendorDirectory::new();
        let vendor = directory.create(new_vendor("Ratiopharm")).unwrap();

        let outcome = directory.delete(vendor.id_typed(), false).unwrap();
        assert_eq!(outcome, VendorDeletion::Removed);
        assert!(directory.get(vendor.id_typed()).is_none());
    }

    #[test]
    fn delete_with_history_deactivates_instead() {
        let directory = VendorDirectory::new();
        let vendor = directory.create(new_vendor("Stada")).unwrap();

        let outcome = directory.delete(vendor.id_typed(), true).unwrap();
        let VendorDeletion::Deactivated(deactivated) = outcome else {
            panic!("expected deactivation");
        };
        assert_eq!(deactivated.status(), VendorStatus::Inactive);

        // Still resolvable for historical receipts.
        assert!(directory.get(vendor.id_typed()).is_some());
        // Hidden from the active listing.
        let active = directory.list(None, Some(VendorStatus::Active));
        assert!(active.is_empty());
    }

    #[test]
    fn list_searches_name_and_contact() {
        let directory = VendorDirectory::new();
        directory.create(new_vendor("Alpha Pharma")).unwrap();
        directory.create(new_vendor("Beta Med")).unwrap();

        let by_name = directory.list(Some("beta"), None);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name(), "Beta Med");

        let by_email = directory.list(Some("alpha.pharma@example"), None);
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].name(), "Alpha Pharma");
    }

    #[test]
    fn list_is_ordered_by_name() {
        let directory = VendorDirectory::new();
        directory.create(new_vendor("Zeta")).unwrap();
        directory.create(new_vendor("alpha")).unwrap();
        directory.create(new_vendor("Mid")).unwrap();

        let names: Vec<String> = directory
            .list(None, None)
            .iter()
            .map(|v| v.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "Mid", "Zeta"]);
    }
}
