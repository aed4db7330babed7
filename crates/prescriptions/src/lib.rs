//! Prescription lifecycle and fulfillment.
//!
//! A prescription moves draft -> finalized -> dispensed, with cancellation
//! possible until it is dispensed. Prices are locked when the prescription is
//! finalized; dispensing writes the actual inventory movements through the
//! stock ledger as one all-or-nothing batch.

pub mod error;
pub mod fulfillment;
pub mod prescription;

pub use error::FulfillmentError;
pub use fulfillment::{FulfillmentService, NewPrescription, NewPrescriptionItem, PrescriptionQuery};
pub use prescription::{Prescription, PrescriptionItem, PrescriptionStatus};
