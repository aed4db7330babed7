use std::str::FromStr;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use apothek_core::ActorId;

use crate::context::ActorContext;

/// Header carrying the authenticated staff member's id, set by the gateway.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Attach the acting staff member to the request, rejecting requests that
/// carry no usable identity.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor_id = extract_actor(req.headers())?;
    req.extensions_mut().insert(ActorContext::new(actor_id));
    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<ActorId, StatusCode> {
    let header = headers
        .get(ACTOR_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let value = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;
    ActorId::from_str(value.trim()).map_err(|_| StatusCode::UNAUTHORIZED)
}
