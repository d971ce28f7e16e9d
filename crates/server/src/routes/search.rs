use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::project::ProjectSummary;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{error::ApiError, extractors::Query, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectSummary>>>, ApiError> {
    let results = state.projects.search(&query.q).await?;
    Ok(ResponseJson(ApiResponse::success(results)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/search", get(search))
}
