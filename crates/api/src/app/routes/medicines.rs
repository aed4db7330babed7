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

use apothek_catalog::{MedicineStatus, NewMedicine, UpdateMedicine};
use apothek_core::MedicineId;

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::{dto, dto::medicine_to_json};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_medicine).get(list_medicines))
        .route("/:id", get(get_medicine).patch(update_medicine))
        .route("/:id/discontinue", post(discontinue_medicine))
}

#[derive(Debug, Deserialize)]
pub struct ListMedicinesQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

pub async fn register_medicine(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterMedicineRequest>,
) -> Result<Response, ApiError> {
    let medicine = services.register_medicine(NewMedicine {
        name: body.name,
        unit_price: body.unit_price,
        low_stock_threshold: body.low_stock_threshold,
    })?;
    Ok(errors::created(medicine_to_json(&medicine)))
}

pub async fn list_medicines(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListMedicinesQuery>,
) -> Result<Response, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;

    let items: Vec<_> = services
        .catalog
        .list(query.search.as_deref(), status)
        .iter()
        .map(medicine_to_json)
        .collect();
    Ok(errors::ok(json!({ "items": items })))
}

pub async fn get_medicine(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: MedicineId = dto::parse_id(&id, "medicine")?;
    let medicine = services.catalog.get(id).ok_or(ApiError::not_found("medicine"))?;
    Ok(errors::ok(medicine_to_json(&medicine)))
}

pub async fn update_medicine(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateMedicineRequest>,
) -> Result<Response, ApiError> {
    let id: MedicineId = dto::parse_id(&id, "medicine")?;
    let medicine = services.catalog.update(
        id,
        UpdateMedicine {
            name: body.name,
            unit_price: body.unit_price,
            low_stock_threshold: body.low_stock_threshold,
        },
    )?;
    Ok(errors::ok(medicine_to_json(&medicine)))
}

pub async fn discontinue_medicine(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: MedicineId = dto::parse_id(&id, "medicine")?;
    let medicine = services.catalog.discontinue(id)?;
    Ok(errors::ok(medicine_to_json(&medicine)))
}

fn parse_status(raw: &str) -> Result<MedicineStatus, ApiError> {
    MedicineStatus::from_str(raw)
        .map_err(|_| ApiError::validation("status must be 'active' or 'discontinued'"))
}
