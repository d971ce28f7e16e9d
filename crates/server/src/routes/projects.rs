use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    pagination::Page,
    project::{CreateProject, Project, ProjectDetails, ProjectSummary, UpdateProject},
};
use services::services::projects::BrowseQuery;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{collaborators, images, milestones};
use crate::{
    error::ApiError,
    extractors::{CurrentUser, Json, Path, Query},
    middleware::rate_limit::rate_limit_mutations,
    state::AppState,
};

/// GET /api/projects?page&per_page&category&owner
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<ResponseJson<ApiResponse<Page<ProjectSummary>>>, ApiError> {
    let page = state.projects.browse(&query).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Project>>), ApiError> {
    let project = state.projects.create(&user, payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(project))))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectDetails>>, ApiError> {
    let details = state.projects.details(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = state.projects.update(&user, project_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.projects.delete(&user, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .merge(images::router(state))
        .merge(collaborators::router(state))
        .merge(milestones::router(state))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_mutations))
}
