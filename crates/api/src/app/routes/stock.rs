use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::Response,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use apothek_core::{MedicineId, TransactionId, VendorId};
use apothek_ledger::{NewTransaction, TransactionFilter, TransactionType};

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::{dto, dto::transaction_to_json};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/transactions", post(record_transaction).get(list_transactions))
        .route("/transactions/:medicine_id", get(list_medicine_transactions))
        .route("/levels", get(stock_levels))
        .route("/levels/:medicine_id", get(stock_level))
        .route("/alerts", get(stock_alerts))
}

/// Manual ledger entry: receipt, adjustment, or return. Dispenses only ever
/// happen through prescription fulfillment.
pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RecordTransactionRequest>,
) -> Result<Response, ApiError> {
    let medicine_id: MedicineId = dto::parse_id(&body.medicine_id, "medicine")?;
    let tx_type = TransactionType::from_str(&body.tx_type).map_err(ApiError::validation)?;

    let new = match tx_type {
        TransactionType::Receipt => {
            let vendor_raw = body
                .vendor_id
                .as_deref()
                .ok_or_else(|| ApiError::validation("receipt transactions require a vendor_id"))?;
            let vendor_id: VendorId = dto::parse_id(vendor_raw, "vendor")?;

            // Receipts must reference a known, active vendor.
            let vendor = services
                .vendors
                .get(vendor_id)
                .ok_or(ApiError::not_found("vendor"))?;
            if !vendor.is_active() {
                return Err(ApiError::rule(format!(
                    "vendor '{}' is inactive and cannot supply stock",
                    vendor.name()
                )));
            }

            NewTransaction::receipt(medicine_id, body.quantity, vendor_id, actor.actor_id())
        }
        TransactionType::Adjustment => {
            let corrects: Option<TransactionId> = body
                .corrects
                .as_deref()
                .map(|raw| dto::parse_id(raw, "transaction"))
                .transpose()?;
            NewTransaction::adjustment(medicine_id, body.quantity, corrects, actor.actor_id())
        }
        TransactionType::Return => {
            NewTransaction::stock_return(medicine_id, body.quantity, actor.actor_id())
        }
        TransactionType::Dispense => {
            return Err(ApiError::validation(
                "dispense entries are written by prescription fulfillment, not manually",
            ));
        }
    };

    let tx = services.ledger.append(new)?;
    Ok(errors::created(transaction_to_json(&tx)))
}

pub async fn stock_levels(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let items: Vec<_> = services
        .stock_views()?
        .iter()
        .map(dto::stock_view_to_json)
        .collect();
    Ok(errors::ok(json!({ "items": items })))
}

pub async fn stock_level(
    Extension(services): Extension<Arc<AppServices>>,
    Path(medicine_id): Path<String>,
) -> Result<Response, ApiError> {
    let medicine_id: MedicineId = dto::parse_id(&medicine_id, "medicine")?;
    let view = services.stock_view(medicine_id)?;
    Ok(errors::ok(dto::stock_view_to_json(&view)))
}

pub async fn stock_alerts(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let alerts = services.stock_alerts()?;
    Ok(errors::ok(json!({ "items": alerts })))
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub medicine_id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, ApiError> {
    let filter = build_filter(&query)?;

    let transactions = match query.medicine_id.as_deref() {
        Some(raw) => {
            let medicine_id: MedicineId = dto::parse_id(raw, "medicine")?;
            services.ledger.list_for_medicine(medicine_id, &filter)?
        }
        None => services.ledger.list(&filter)?,
    };

    let items: Vec<_> = transactions.iter().map(transaction_to_json).collect();
    Ok(errors::ok(json!({ "items": items })))
}

pub async fn list_medicine_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(medicine_id): Path<String>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Response, ApiError> {
    let medicine_id: MedicineId = dto::parse_id(&medicine_id, "medicine")?;
    let filter = build_filter(&query)?;
    let items: Vec<_> = services
        .ledger
        .list_for_medicine(medicine_id, &filter)?
        .iter()
        .map(transaction_to_json)
        .collect();
    Ok(errors::ok(json!({ "items": items })))
}

fn build_filter(query: &TransactionsQuery) -> Result<TransactionFilter, ApiError> {
    let tx_type = query
        .tx_type
        .as_deref()
        .map(TransactionType::from_str)
        .transpose()
        .map_err(ApiError::validation)?;

    Ok(TransactionFilter {
        tx_type,
        start: query.start_date,
        end: query.end_date,
        limit: query.limit,
    })
}
