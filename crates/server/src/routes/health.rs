use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::state::AppState;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub database: bool,
}

pub async fn health(State(state): State<AppState>) -> ResponseJson<ApiResponse<HealthStatus>> {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            false
        }
    };
    ResponseJson(ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        database,
    }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
