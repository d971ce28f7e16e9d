use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use services::services::projects::UserOverview;
use utils::response::ApiResponse;

use crate::{error::ApiError, extractors::Path, state::AppState};

/// GET /api/users/{username}
/// Public profile with owned and collaborated projects
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<ResponseJson<ApiResponse<UserOverview>>, ApiError> {
    let overview = state.projects.user_overview(&username).await?;
    Ok(ResponseJson(ApiResponse::success(overview)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/users/{username}", get(get_user))
}
