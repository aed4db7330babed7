//! Stock ledger: the append-only source of truth for inventory movements.
//!
//! Every receipt, dispense, adjustment, and return is an immutable
//! `StockTransaction`. Corrections are new offsetting entries, never edits.
//! The derived on-hand quantity per medicine is maintained in the same
//! critical section as the append, so a committed entry is always visible to
//! the next read and stock can never go negative.

pub mod alerts;
pub mod error;
pub mod projector;
pub mod query;
pub mod store;
pub mod transaction;

pub use alerts::{AlertSeverity, MedicineStockView, StockAlert, compute_alerts};
pub use error::LedgerError;
pub use projector::StockProjector;
pub use query::TransactionFilter;
pub use store::StockLedger;
pub use transaction::{NewTransaction, StockTransaction, TransactionType};
