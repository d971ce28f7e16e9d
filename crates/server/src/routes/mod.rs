use axum::{Router, extract::DefaultBodyLimit};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{config::Config, state::AppState};

pub mod auth;
pub mod collaborators;
pub mod health;
pub mod images;
pub mod milestones;
pub mod oauth;
pub mod projects;
pub mod search;
pub mod users;

pub fn router(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .merge(health::router(&state))
        .merge(auth::router(&state))
        .merge(oauth::router(&state))
        .merge(users::router(&state))
        .merge(projects::router(&state))
        .merge(search::router(&state));

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
