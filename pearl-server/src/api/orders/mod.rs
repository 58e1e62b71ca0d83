//! Order API Module
//!
//! Checkout plus the staff console operations. All mutations go through
//! `OrderService`.

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/checkout", post(handler::checkout))
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/claim", post(handler::claim))
        .route("/{id}/assign", post(handler::assign))
        .route("/{id}/status", post(handler::update_status))
        .route("/{id}/print", post(handler::mark_printed))
        .route("/{id}/items/{idx}/variant", put(handler::update_item_variant))
}
