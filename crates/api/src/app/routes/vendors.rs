use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use apothek_core::VendorId;
use apothek_vendors::{NewVendor, UpdateVendor, VendorDeletion, VendorStatus};

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::{dto, dto::vendor_to_json};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_vendor).get(list_vendors))
        .route("/:id", get(get_vendor).put(update_vendor).delete(delete_vendor))
}

pub async fn create_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateVendorRequest>,
) -> Result<Response, ApiError> {
    let vendor = services.vendors.create(NewVendor {
        name: body.name,
        contact: body.contact.unwrap_or_default(),
    })?;
    Ok(errors::created(vendor_to_json(&vendor)))
}

#[derive(Debug, Deserialize)]
pub struct ListVendorsQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

pub async fn list_vendors(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListVendorsQuery>,
) -> Result<Response, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;

    let items: Vec<_> = services
        .vendors
        .list(query.search.as_deref(), status)
        .iter()
        .map(vendor_to_json)
        .collect();
    Ok(errors::ok(json!({ "items": items })))
}

pub async fn get_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: VendorId = dto::parse_id(&id, "vendor")?;
    let vendor = services.vendors.get(id).ok_or(ApiError::not_found("vendor"))?;
    Ok(errors::ok(vendor_to_json(&vendor)))
}

pub async fn update_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateVendorRequest>,
) -> Result<Response, ApiError> {
    let id: VendorId = dto::parse_id(&id, "vendor")?;
    let vendor = services.vendors.update(
        id,
        UpdateVendor {
            name: body.name,
            contact: body.contact,
        },
    )?;
    Ok(errors::ok(vendor_to_json(&vendor)))
}

/// Delete a vendor. With ledger history the vendor is deactivated instead of
/// removed, so historical receipts keep resolving.
pub async fn delete_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: VendorId = dto::parse_id(&id, "vendor")?;
    let has_history = services.ledger.vendor_has_history(id)?;

    match services.vendors.delete(id, has_history)? {
        VendorDeletion::Deactivated(vendor) => Ok(errors::ok(json!({
            "deleted": false,
            "deactivated": true,
            "vendor": vendor_to_json(&vendor),
        }))),
        VendorDeletion::Removed => Ok(errors::ok(json!({
            "deleted": true,
            "deactivated": false,
        }))),
    }
}

fn parse_status(raw: &str) -> Result<VendorStatus, ApiError> {
    match raw.to_lowercase().as_str() {
        "active" => Ok(VendorStatus::Active),
        "inactive" => Ok(VendorStatus::Inactive),
        _ => Err(ApiError::validation("status must be 'active' or 'inactive'")),
    }
}
