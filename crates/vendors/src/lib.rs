//! Vendor directory: the suppliers medicines are received from.
//!
//! Vendors referenced by ledger history are never hard-deleted; deleting one
//! deactivates it instead so old receipts keep resolving.

pub mod directory;
pub mod vendor;

pub use directory::{VendorDeletion, VendorDirectory, VendorError};
pub use vendor::{ContactInfo, NewVendor, UpdateVendor, Vendor, VendorStatus};
