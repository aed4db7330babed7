use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use apothek_core::PatientId;
use apothek_patients::NewPatient;

use crate::app::dto;
use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_patient))
        .route("/search", get(search_patients))
        .route("/:id", get(get_patient))
}

pub async fn register_patient(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterPatientRequest>,
) -> Result<Response, ApiError> {
    let patient = services.patients.register(NewPatient {
        full_name: body.full_name,
        mrn: body.mrn,
        contact_number: body.contact_number,
    })?;
    Ok(errors::created(json!(patient)))
}

#[derive(Debug, Deserialize)]
pub struct SearchPatientsQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub all: bool,
}

pub async fn search_patients(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SearchPatientsQuery>,
) -> Result<Response, ApiError> {
    let items = services.patients.search(&query.q, query.all);
    Ok(errors::ok(json!({ "items": items })))
}

pub async fn get_patient(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: PatientId = dto::parse_id(&id, "patient")?;
    let patient = services
        .patients
        .get(id)
        .ok_or(ApiError::not_found("patient"))?;
    Ok(errors::ok(json!(patient)))
}
