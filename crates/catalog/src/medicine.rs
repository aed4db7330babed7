use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apothek_core::{Entity, MedicineId};

/// Medicine status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicineStatus {
    Active,
    Discontinued,
}

impl std::str::FromStr for MedicineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MedicineStatus::Active),
            "discontinued" => Ok(MedicineStatus::Discontinued),
            other => Err(format!("unknown medicine status '{other}'")),
        }
    }
}

/// Catalog record for a medicine.
///
/// `low_stock_threshold` of `None` (or zero) means no low-stock alert is
/// possible for this medicine, only out-of-stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    id: MedicineId,
    name: String,
    /// Price in smallest currency unit (e.g., cents).
    unit_price: u64,
    low_stock_threshold: Option<u32>,
    status: MedicineStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Medicine {
    pub(crate) fn new(
        id: MedicineId,
        name: String,
        unit_price: u64,
        low_stock_threshold: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            unit_price,
            low_stock_threshold,
            status: MedicineStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id_typed(&self) -> MedicineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn low_stock_threshold(&self) -> Option<u32> {
        self.low_stock_threshold
    }

    pub fn status(&self) -> MedicineStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Discontinued medicines cannot appear on new prescriptions.
    pub fn can_be_prescribed(&self) -> bool {
        self.status == MedicineStatus::Active
    }

    pub(crate) fn apply_update(&mut self, update: &UpdateMedicine, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(price) = update.unit_price {
            self.unit_price = price;
        }
        if let Some(threshold) = update.low_stock_threshold {
            self.low_stock_threshold = Some(threshold);
        }
        self.updated_at = now;
    }

    pub(crate) fn discontinue(&mut self, now: DateTime<Utc>) {
        self.status = MedicineStatus::Discontinued;
        self.updated_at = now;
    }
}

impl Entity for Medicine {
    type Id = MedicineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for registering a new medicine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub unit_price: u64,
    pub low_stock_threshold: Option<u32>,
}

/// Partial update of a medicine's master data (absent fields keep their value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMedicine {
    pub name: Option<String>,
    pub unit_price: Option<u64>,
    pub low_stock_threshold: Option<u32>,
}
