use axum::{
    Router,
    extract::{Multipart, State},
    response::Json as ResponseJson,
    routing::{delete, post},
};
use services::services::projects::UploadReport;
use tracing::debug;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extractors::{CurrentUser, Path},
    state::AppState,
};

const IMAGES_FIELD: &str = "images";

/// POST /api/projects/{project_id}/images
/// Multipart upload; every `images` part is one file
pub async fn upload_images(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<UploadReport>>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGES_FIELD) {
            debug!(field = ?field.name(), "Ignoring unexpected multipart field");
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            continue;
        }
        let bytes = field.bytes().await?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("no images were uploaded".to_string()));
    }

    let report = state.projects.add_images(&user, project_id, files).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn delete_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((project_id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .projects
        .remove_image(&user, project_id, image_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/images", post(upload_images))
        .route("/projects/{project_id}/images/{image_id}", delete(delete_image))
}
