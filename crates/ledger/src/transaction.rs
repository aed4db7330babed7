use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apothek_core::{ActorId, MedicineId, PrescriptionId, TransactionId, VendorId};

use crate::error::LedgerError;

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Stock received from a vendor (positive delta, vendor required).
    Receipt,
    /// Stock handed out against a prescription or manually (negative delta).
    Dispense,
    /// Manual correction, either sign; may reference the entry it corrects.
    Adjustment,
    /// Stock returned to the shelf (positive delta).
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Receipt => "receipt",
            TransactionType::Dispense => "dispense",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Return => "return",
        }
    }

    /// Sign rule for this type: receipts/returns add stock, dispenses remove
    /// it, adjustments may do either (but never nothing).
    pub fn allows_delta(&self, delta: i64) -> bool {
        match self {
            TransactionType::Receipt | TransactionType::Return => delta > 0,
            TransactionType::Dispense => delta < 0,
            TransactionType::Adjustment => delta != 0,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "receipt" => Ok(TransactionType::Receipt),
            "dispense" => Ok(TransactionType::Dispense),
            "adjustment" => Ok(TransactionType::Adjustment),
            "return" => Ok(TransactionType::Return),
            other => Err(format!(
                "unknown transaction type '{other}' (expected receipt, dispense, adjustment, or return)"
            )),
        }
    }
}

/// A stock movement ready to be appended (not yet assigned an id or sequence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub medicine_id: MedicineId,
    pub tx_type: TransactionType,
    pub quantity_delta: i64,
    pub actor_id: ActorId,
    pub vendor_id: Option<VendorId>,
    pub prescription_id: Option<PrescriptionId>,
    /// For offsetting adjustments: the entry being corrected.
    pub corrects: Option<TransactionId>,
}

impl NewTransaction {
    pub fn receipt(
        medicine_id: MedicineId,
        quantity: i64,
        vendor_id: VendorId,
        actor_id: ActorId,
    ) -> Self {
        Self {
            medicine_id,
            tx_type: TransactionType::Receipt,
            quantity_delta: quantity,
            actor_id,
            vendor_id: Some(vendor_id),
            prescription_id: None,
            corrects: None,
        }
    }

    pub fn dispense(
        medicine_id: MedicineId,
        quantity: i64,
        prescription_id: Option<PrescriptionId>,
        actor_id: ActorId,
    ) -> Self {
        Self {
            medicine_id,
            tx_type: TransactionType::Dispense,
            quantity_delta: -quantity.abs(),
            actor_id,
            vendor_id: None,
            prescription_id,
            corrects: None,
        }
    }

    pub fn adjustment(
        medicine_id: MedicineId,
        delta: i64,
        corrects: Option<TransactionId>,
        actor_id: ActorId,
    ) -> Self {
        Self {
            medicine_id,
            tx_type: TransactionType::Adjustment,
            quantity_delta: delta,
            actor_id,
            vendor_id: None,
            prescription_id: None,
            corrects,
        }
    }

    pub fn stock_return(medicine_id: MedicineId, quantity: i64, actor_id: ActorId) -> Self {
        Self {
            medicine_id,
            tx_type: TransactionType::Return,
            quantity_delta: quantity,
            actor_id,
            vendor_id: None,
            prescription_id: None,
            corrects: None,
        }
    }

    /// Deterministic entry validation: sign/type rules and the
    /// vendor-required rule for receipts. Balance checks happen later, under
    /// the medicine's guard.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity_delta == 0 || !self.tx_type.allows_delta(self.quantity_delta) {
            return Err(LedgerError::InvalidQuantity {
                tx_type: self.tx_type,
                delta: self.quantity_delta,
            });
        }
        if self.tx_type == TransactionType::Receipt && self.vendor_id.is_none() {
            return Err(LedgerError::VendorRequired);
        }
        Ok(())
    }
}

/// An immutable, committed ledger entry.
///
/// `sequence_number` increases monotonically per medicine stream, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub medicine_id: MedicineId,
    pub tx_type: TransactionType,
    pub quantity_delta: i64,
    pub vendor_id: Option<VendorId>,
    pub prescription_id: Option<PrescriptionId>,
    pub corrects: Option<TransactionId>,
    pub recorded_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub sequence_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorId {
        ActorId::new()
    }

    #[test]
    fn receipt_requires_positive_delta() {
        let mut tx = NewTransaction::receipt(MedicineId::new(), 10, VendorId::new(), actor());
        assert!(tx.validate().is_ok());

        tx.quantity_delta = -10;
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn receipt_without_vendor_is_rejected() {
        let mut tx = NewTransaction::receipt(MedicineId::new(), 10, VendorId::new(), actor());
        tx.vendor_id = None;
        assert_eq!(tx.validate(), Err(LedgerError::VendorRequired));
    }

    #[test]
    fn dispense_helper_normalizes_to_negative() {
        let tx = NewTransaction::dispense(MedicineId::new(), 3, None, actor());
        assert_eq!(tx.quantity_delta, -3);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn zero_delta_is_always_invalid() {
        let tx = NewTransaction::adjustment(MedicineId::new(), 0, None, actor());
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::InvalidQuantity { delta: 0, .. })
        ));
    }

    #[test]
    fn adjustment_accepts_either_sign() {
        assert!(NewTransaction::adjustment(MedicineId::new(), -5, None, actor())
            .validate()
            .is_ok());
        assert!(NewTransaction::adjustment(MedicineId::new(), 5, None, actor())
            .validate()
            .is_ok());
    }

    #[test]
    fn return_requires_positive_delta() {
        let mut tx = NewTransaction::stock_return(MedicineId::new(), 2, actor());
        assert!(tx.validate().is_ok());
        tx.quantity_delta = -2;
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn transaction_type_parses_from_str() {
        assert_eq!("receipt".parse::<TransactionType>().unwrap(), TransactionType::Receipt);
        assert_eq!("RETURN".parse::<TransactionType>().unwrap(), TransactionType::Return);
        assert!("refund".parse::<TransactionType>().is_err());
    }
}
