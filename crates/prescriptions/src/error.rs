use thiserror::Error;

use apothek_catalog::CatalogError;
use apothek_core::{DomainError, PrescriptionId};
use apothek_ledger::LedgerError;

/// Fulfillment workflow error.
///
/// Catalog and ledger failures pass through transparently so callers can
/// still distinguish, say, insufficient stock from a discontinued medicine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("prescription {0} not found")]
    NotFound(PrescriptionId),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Stock(#[from] LedgerError),

    #[error(transparent)]
    Lifecycle(#[from] DomainError),

    /// Another operation holds this prescription's guard; retry shortly.
    #[error("prescription {0} is busy")]
    Busy(PrescriptionId),

    #[error("prescription state unavailable: {0}")]
    Internal(String),
}

impl FulfillmentError {
    /// Whether a caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy(_) => true,
            Self::Stock(e) => e.is_retryable(),
            Self::Lifecycle(e) => e.is_retryable(),
            _ => false,
        }
    }
}
