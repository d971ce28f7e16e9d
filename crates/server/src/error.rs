use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::{
    auth::AuthError, oauth::OAuthError, projects::ProjectServiceError,
    rate_limit::RateLimitExceeded,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Project(#[from] ProjectServiceError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("{}", .0.body_text())]
    Json(#[from] JsonRejection),
    #[error("{}", .0.body_text())]
    Path(#[from] PathRejection),
    #[error("{}", .0.body_text())]
    Query(#[from] QueryRejection),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => match e {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::UsernameTaken => StatusCode::CONFLICT,
                AuthError::InvalidCredentials | AuthError::InvalidSession => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Database(_) | AuthError::Hashing(_) | AuthError::Token(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Project(e) => match e {
                ProjectServiceError::ProjectNotFound | ProjectServiceError::NotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ProjectServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                ProjectServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ProjectServiceError::Conflict(_) => StatusCode::CONFLICT,
                ProjectServiceError::Database(_) | ProjectServiceError::Upload(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::OAuth(e) => match e {
                OAuthError::StateMismatch => StatusCode::BAD_REQUEST,
                OAuthError::Transport(_)
                | OAuthError::Http { .. }
                | OAuthError::Serde(_)
                | OAuthError::MissingSubject => StatusCode::BAD_GATEWAY,
                OAuthError::Database(_) | OAuthError::Url(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // body limit overruns surface here as 413
            ApiError::Multipart(e) => e.status(),
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Json(e) => e.status(),
            ApiError::Path(e) => e.status(),
            ApiError::Query(e) => e.status(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response =
            (status, ResponseJson(ApiResponse::<()>::error(message))).into_response();

        if let ApiError::RateLimited(limit) = &self {
            let seconds = (limit.retry_after.as_secs_f64().ceil() as u64).max(1).to_string();
            if let Ok(value) = HeaderValue::from_str(&seconds) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
