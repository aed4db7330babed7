use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use apothek_catalog::CatalogError;
use apothek_core::DomainError;
use apothek_ledger::LedgerError;
use apothek_patients::PatientError;
use apothek_prescriptions::FulfillmentError;
use apothek_vendors::VendorError;

/// Uniform success envelope.
pub fn ok(data: serde_json::Value) -> Response {
    envelope(StatusCode::OK, data)
}

pub fn created(data: serde_json::Value) -> Response {
    envelope(StatusCode::CREATED, data)
}

fn envelope(status: StatusCode, data: serde_json::Value) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

/// One HTTP-facing error shape for every domain failure.
///
/// Status conventions: malformed input 400, broken business rule 422,
/// missing resource 404, guard contention 409, everything unexpected 500.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn rule(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "rule_violation", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "busy", message)
    }

    /// Internal failures are logged with their detail but surface a fixed
    /// generic message, so nothing about the server's internals leaks out.
    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(%detail, "internal failure");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            INTERNAL_MESSAGE,
        )
    }
}

const INTERNAL_MESSAGE: &str = "an unexpected internal error occurred";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "success": false,
                "error": { "code": self.code, "message": self.message },
            })),
        )
            .into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::Validation(_) | DomainError::InvalidId(_) => {
                Self::validation(err.to_string())
            }
            DomainError::Rule(_) => Self::rule(err.to_string()),
            DomainError::NotFound => Self::not_found("resource"),
            DomainError::Conflict(_) => Self::busy(err.to_string()),
            DomainError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::InvalidQuantity { .. } | LedgerError::VendorRequired => {
                Self::validation(err.to_string())
            }
            LedgerError::UnknownMedicine(_) => Self::not_found("medicine"),
            LedgerError::InsufficientStock { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", err.to_string())
            }
            LedgerError::Busy(_) => Self::busy(err.to_string()),
            LedgerError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::Validation(_) => Self::validation(err.to_string()),
            CatalogError::DuplicateName(_) | CatalogError::Discontinued(_) => {
                Self::rule(err.to_string())
            }
            CatalogError::NotFound => Self::not_found("medicine"),
            CatalogError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<VendorError> for ApiError {
    fn from(err: VendorError) -> Self {
        match &err {
            VendorError::Validation(_) => Self::validation(err.to_string()),
            VendorError::DuplicateName(_) => Self::rule(err.to_string()),
            VendorError::NotFound => Self::not_found("vendor"),
            VendorError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<PatientError> for ApiError {
    fn from(err: PatientError) -> Self {
        match &err {
            PatientError::Validation(_) => Self::validation(err.to_string()),
            PatientError::DuplicateMrn(_) => Self::rule(err.to_string()),
            PatientError::NotFound => Self::not_found("patient"),
            PatientError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::Validation(msg) => Self::validation(msg),
            FulfillmentError::NotFound(_) => Self::not_found("prescription"),
            FulfillmentError::Catalog(inner) => inner.into(),
            FulfillmentError::Stock(inner) => inner.into(),
            FulfillmentError::Lifecycle(inner) => inner.into(),
            busy @ FulfillmentError::Busy(_) => Self::busy(busy.to_string()),
            FulfillmentError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apothek_core::MedicineId;

    #[test]
    fn internal_detail_never_reaches_the_caller() {
        let err = ApiError::from(LedgerError::Internal(
            "cell map lock poisoned".to_string(),
        ));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal_error");
        assert_eq!(err.message, INTERNAL_MESSAGE);
    }

    #[test]
    fn guard_contention_maps_to_conflict() {
        let err = ApiError::from(LedgerError::Busy(MedicineId::new()));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "busy");
    }
}
