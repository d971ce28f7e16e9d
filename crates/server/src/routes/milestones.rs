use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::milestone::{CreateMilestone, Milestone, UpdateMilestone};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extractors::{CurrentUser, Json, Path},
    state::AppState,
};

pub async fn list_milestones(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Milestone>>>, ApiError> {
    let milestones = state.projects.milestones(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(milestones)))
}

pub async fn create_milestone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateMilestone>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Milestone>>), ApiError> {
    let milestone = state
        .projects
        .create_milestone(&user, project_id, payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(milestone))))
}

pub async fn update_milestone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_id, milestone_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMilestone>,
) -> Result<ResponseJson<ApiResponse<Milestone>>, ApiError> {
    let milestone = state
        .projects
        .update_milestone(&user, project_id, milestone_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(milestone)))
}

pub async fn delete_milestone(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_id, milestone_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .projects
        .delete_milestone(&user, project_id, milestone_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/milestones",
            get(list_milestones).post(create_milestone),
        )
        .route(
            "/projects/{project_id}/milestones/{milestone_id}",
            patch(update_milestone).delete(delete_milestone),
        )
}
