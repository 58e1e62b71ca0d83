//! Health check

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    /// Server instance epoch — changes on restart, lets clients resync
    pub epoch: String,
}

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

async fn health(State(state): State<ServerState>) -> AppResult<Json<HealthInfo>> {
    // Prove the pool is alive, not just the process
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await?;
    Ok(Json(HealthInfo {
        status: "ok",
        epoch: state.hub.epoch().to_string(),
    }))
}
