use thiserror::Error;

use apothek_core::MedicineId;

use crate::transaction::TransactionType;

/// Stock ledger operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Zero delta, or a delta whose sign does not match the transaction type.
    #[error("invalid quantity {delta} for {tx_type} transaction")]
    InvalidQuantity {
        tx_type: TransactionType,
        delta: i64,
    },

    /// Receipts must name the supplying vendor.
    #[error("receipt transactions require a vendor reference")]
    VendorRequired,

    /// The medicine is not tracked by this ledger.
    #[error("medicine {0} is not tracked by the stock ledger")]
    UnknownMedicine(MedicineId),

    /// Applying the entry would drive on-hand stock negative.
    #[error("insufficient stock for medicine {medicine_id}: on hand {on_hand}, requested {requested}")]
    InsufficientStock {
        medicine_id: MedicineId,
        on_hand: u64,
        requested: u64,
    },

    /// The per-medicine guard could not be acquired within the deadline.
    /// Safe to retry with backoff.
    #[error("stock guard for medicine {0} is busy")]
    Busy(MedicineId),

    /// Ledger state unavailable (poisoned lock). Not expected in practice.
    #[error("ledger state unavailable: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
