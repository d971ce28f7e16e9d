use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::user::UserProfile;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extractors::{CurrentUser, Json, Path},
    state::AppState,
};

#[derive(Debug, Deserialize, TS)]
pub struct AddCollaborator {
    pub username: String,
}

pub async fn list_collaborators(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<UserProfile>>>, ApiError> {
    let collaborators = state.projects.collaborators(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(collaborators)))
}

pub async fn add_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddCollaborator>,
) -> Result<ResponseJson<ApiResponse<UserProfile>>, ApiError> {
    let added = state
        .projects
        .add_collaborator(&user, project_id, &payload.username)
        .await?;
    Ok(ResponseJson(ApiResponse::success(added)))
}

pub async fn remove_collaborator(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .projects
        .remove_collaborator(&user, project_id, user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/collaborators",
            get(list_collaborators).post(add_collaborator),
        )
        .route(
            "/projects/{project_id}/collaborators/{user_id}",
            delete(remove_collaborator),
        )
}
