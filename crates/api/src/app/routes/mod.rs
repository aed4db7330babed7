use axum::Router;

pub mod medicines;
pub mod patients;
pub mod prescriptions;
pub mod stock;
pub mod system;
pub mod vendors;

/// Router for all endpoints that require an acting staff member.
pub fn router() -> Router {
    Router::new()
        .nest("/medicines", medicines::router())
        .nest("/stock", stock::router())
        .nest("/prescriptions", prescriptions::router())
        .nest("/vendors", vendors::router())
        .nest("/patients", patients::router())
}
