//! Medicine catalog: the registry of dispensable medicines.
//!
//! The catalog owns medicine master data (name, price, low-stock threshold,
//! status). Current stock is **not** stored here; it is derived by the
//! ledger's projector from the transaction history.

pub mod medicine;
pub mod registry;

pub use medicine::{Medicine, MedicineStatus, NewMedicine, UpdateMedicine};
pub use registry::{CatalogError, MedicineCatalog};
