//! Patient registry: the minimal patient lookup prescriptions link against.

pub mod registry;

pub use registry::{NewPatient, Patient, PatientError, PatientRegistry};
