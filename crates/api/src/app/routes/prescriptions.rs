use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use apothek_core::{DoctorId, MedicineId, PatientId, PrescriptionId};
use apothek_prescriptions::{
    NewPrescription, NewPrescriptionItem, PrescriptionQuery, PrescriptionStatus,
};

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::{dto, dto::prescription_to_json};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_prescription).get(list_prescriptions))
        .route("/:id", get(get_prescription))
        .route("/:id/finalize", post(finalize_prescription))
        .route("/:id/dispense", post(dispense_prescription))
        .route("/:id/cancel", post(cancel_prescription))
}

pub async fn create_prescription(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreatePrescriptionRequest>,
) -> Result<Response, ApiError> {
    let patient_id: PatientId = dto::parse_id(&body.patient_id, "patient")?;
    let doctor_id: DoctorId = dto::parse_id(&body.doctor_id, "doctor")?;

    if !services.patients.exists(patient_id) {
        return Err(ApiError::not_found("patient"));
    }

    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let medicine_id: MedicineId = dto::parse_id(&item.medicine_id, "medicine")?;
        items.push(NewPrescriptionItem {
            medicine_id,
            dosage: item.dosage,
            frequency: item.frequency,
            duration: item.duration,
            quantity: item.quantity,
        });
    }

    let prescription = services.fulfillment.create(NewPrescription {
        patient_id,
        doctor_id,
        items,
        notes: body.notes,
    })?;
    Ok(errors::created(prescription_to_json(&prescription)))
}

#[derive(Debug, Deserialize)]
pub struct ListPrescriptionsQuery {
    pub status: Option<String>,
    pub patient_id: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_prescriptions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListPrescriptionsQuery>,
) -> Result<Response, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;
    let patient_id: Option<PatientId> = query
        .patient_id
        .as_deref()
        .map(|raw| dto::parse_id(raw, "patient"))
        .transpose()?;

    let items: Vec<_> = services
        .fulfillment
        .list(&PrescriptionQuery {
            status,
            patient_id,
            search: query.search,
            limit: query.limit,
        })?
        .iter()
        .map(prescription_to_json)
        .collect();
    Ok(errors::ok(json!({ "items": items })))
}

pub async fn get_prescription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: PrescriptionId = dto::parse_id(&id, "prescription")?;
    let prescription = services.fulfillment.get(id)?;
    Ok(errors::ok(prescription_to_json(&prescription)))
}

pub async fn finalize_prescription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: PrescriptionId = dto::parse_id(&id, "prescription")?;
    let prescription = services.fulfillment.finalize(id)?;
    Ok(errors::ok(prescription_to_json(&prescription)))
}

pub async fn dispense_prescription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: PrescriptionId = dto::parse_id(&id, "prescription")?;
    // Dispensing can wait on medicine guards, so it runs off the async
    // workers.
    let prescription = tokio::task::spawn_blocking(move || {
        services.fulfillment.dispense(id, actor.actor_id())
    })
    .await
    .map_err(|join| ApiError::internal(join.to_string()))??;
    Ok(errors::ok(prescription_to_json(&prescription)))
}

pub async fn cancel_prescription(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: PrescriptionId = dto::parse_id(&id, "prescription")?;
    let prescription = services.fulfillment.cancel(id)?;
    Ok(errors::ok(prescription_to_json(&prescription)))
}

fn parse_status(raw: &str) -> Result<PrescriptionStatus, ApiError> {
    PrescriptionStatus::from_str(raw).map_err(|_| {
        ApiError::validation("status must be one of: draft, finalized, dispensed, cancelled")
    })
}
