//! HTTP API
//!
//! Route composition. Authentication/session middleware is out of scope
//! for this service; actor identity arrives in request payloads.

pub mod health;
pub mod orders;
pub mod payments;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(payments::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
