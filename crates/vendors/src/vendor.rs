use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apothek_core::VendorId;

/// Contact details for a vendor. All fields optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    /// Case-insensitive match against any contact field.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.email, &self.phone, &self.address]
            .iter()
            .any(|field| {
                field
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
    Active,
    /// Soft-deleted: hidden from default listings, still resolvable from
    /// ledger history.
    Inactive,
}

/// A medicine supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    id: VendorId,
    name: String,
    contact: ContactInfo,
    status: VendorStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Vendor {
    pub(crate) fn new(name: String, contact: ContactInfo) -> Self {
        let now = Utc::now();
        Self {
            id: VendorId::new(),
            name,
            contact,
            status: VendorStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id_typed(&self) -> VendorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> VendorStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == VendorStatus::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn apply_update(&mut self, update: UpdateVendor) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(contact) = update.contact {
            self.contact = contact;
        }
        self.updated_at = Utc::now();
    }

    pub(crate) fn deactivate(&mut self) {
        self.status = VendorStatus::Inactive;
        self.updated_at = Utc::now();
    }
}

/// Input for registering a vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVendor {
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVendor {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
}
