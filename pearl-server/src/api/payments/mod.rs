//! Payment API Module
//!
//! The provider-facing webhook plus the storefront status check.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/webhook", post(handler::webhook))
        .route("/{order_id}/status", get(handler::status))
}
