use std::str::FromStr;

use serde::Deserialize;
use serde_json::json;

use apothek_catalog::Medicine;
use apothek_core::DomainError;
use apothek_ledger::{MedicineStockView, StockTransaction};
use apothek_prescriptions::Prescription;
use apothek_vendors::{ContactInfo, Vendor};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterMedicineRequest {
    pub name: String,
    pub unit_price: u64,
    pub low_stock_threshold: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMedicineRequest {
    pub name: Option<String>,
    pub unit_price: Option<u64>,
    pub low_stock_threshold: Option<u32>,
}

/// Manual ledger entry. `quantity` is the signed delta for adjustments and
/// the (positive) quantity for receipts and returns.
#[derive(Debug, Deserialize)]
pub struct RecordTransactionRequest {
    pub medicine_id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub quantity: i64,
    pub vendor_id: Option<String>,
    /// Id of the ledger entry this adjustment corrects, if any.
    pub corrects: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrescriptionItemRequest {
    pub medicine_id: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub items: Vec<PrescriptionItemRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVendorRequest {
    pub name: String,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVendorRequest {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPatientRequest {
    pub full_name: String,
    pub mrn: String,
    pub contact_number: Option<String>,
}

// -------------------------
// Helpers
// -------------------------

/// Parse a path/body id into its typed form; malformed ids are the caller's
/// fault, not a missing resource.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    T::from_str(raw).map_err(|_| ApiError::validation(format!("invalid {what} id: '{raw}'")))
}

// -------------------------
// Response mapping
// -------------------------

pub fn medicine_to_json(medicine: &Medicine) -> serde_json::Value {
    json!({
        "id": medicine.id_typed(),
        "name": medicine.name(),
        "unit_price": medicine.unit_price(),
        "low_stock_threshold": medicine.low_stock_threshold(),
        "status": medicine.status(),
        "created_at": medicine.created_at(),
        "updated_at": medicine.updated_at(),
    })
}

pub fn transaction_to_json(tx: &StockTransaction) -> serde_json::Value {
    json!({
        "id": tx.id,
        "medicine_id": tx.medicine_id,
        "type": tx.tx_type,
        "quantity_delta": tx.quantity_delta,
        "vendor_id": tx.vendor_id,
        "prescription_id": tx.prescription_id,
        "corrects": tx.corrects,
        "recorded_at": tx.recorded_at,
        "recorded_by": tx.actor_id,
        "sequence_number": tx.sequence_number,
    })
}

pub fn stock_view_to_json(view: &MedicineStockView) -> serde_json::Value {
    json!({
        "medicine_id": view.medicine_id,
        "name": view.name,
        "on_hand": view.on_hand,
        "low_stock_threshold": view.low_stock_threshold,
    })
}

pub fn prescription_to_json(prescription: &Prescription) -> serde_json::Value {
    json!({
        "id": prescription.id_typed(),
        "patient_id": prescription.patient_id(),
        "doctor_id": prescription.doctor_id(),
        "status": prescription.status(),
        "items": prescription.items(),
        "notes": prescription.notes(),
        "total": prescription.total(),
        "created_at": prescription.created_at(),
        "updated_at": prescription.updated_at(),
    })
}

pub fn vendor_to_json(vendor: &Vendor) -> serde_json::Value {
    json!({
        "id": vendor.id_typed(),
        "name": vendor.name(),
        "contact": vendor.contact(),
        "status": vendor.status(),
        "created_at": vendor.created_at(),
        "updated_at": vendor.updated_at(),
    })
}
