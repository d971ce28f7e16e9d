use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Redirect,
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use services::services::oauth::{
    OAuthClient, OAuthError, find_or_create_user, generate_state, state_matches,
};
use tracing::{info, warn};

use super::auth::start_session;
use crate::{
    error::ApiError, extractors::Query, middleware::rate_limit::rate_limit, state::AppState,
};

const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/api/auth/oauth";
/// How long a login attempt may take before its state cookie expires
const STATE_COOKIE_MAX_AGE: time::Duration = time::Duration::minutes(10);

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn client(state: &AppState) -> Result<Arc<OAuthClient>, ApiError> {
    state
        .oauth
        .clone()
        .ok_or_else(|| ApiError::NotFound("OAuth login is not enabled".to_string()))
}

pub async fn oauth_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let client = client(&state)?;
    let csrf = generate_state();
    let url = client.authorize_url(&csrf)?;

    let cookie = Cookie::build((STATE_COOKIE, csrf))
        .path(STATE_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(STATE_COOKIE_MAX_AGE)
        .build();
    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let client = client(&state)?;
    if let Some(error) = query.error {
        warn!(provider = %client.provider(), error = %error, "Provider refused authorization");
        return Err(ApiError::BadRequest(format!("authorization failed: {error}")));
    }

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(returned)) if state_matches(expected, returned) => {}
        _ => return Err(OAuthError::StateMismatch.into()),
    }
    let code = query
        .code
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".to_string()))?;

    let access_token = client.exchange_code(&code).await?;
    let identity = client.fetch_identity(&access_token).await?;
    let user = find_or_create_user(&state.db.pool, client.provider(), &identity).await?;
    info!(username = %user.username, provider = %client.provider(), "User logged in with OAuth");

    let jar = jar.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH).build());
    let (jar, _session) = start_session(&state, jar, user)?;
    Ok((jar, Redirect::to("/")))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/oauth/login", get(oauth_login))
        .route(
            "/auth/oauth/callback",
            get(oauth_callback).route_layer(from_fn_with_state(state.clone(), rate_limit)),
        )
}
