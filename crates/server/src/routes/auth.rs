use axum::{
    Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use db::models::user::{User, UserProfile};
use serde::{Deserialize, Serialize};
use services::services::{
    auth::{LoginRequest, RegisterUser},
    mailer::NotificationService,
};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    error::ApiError,
    extractors::{CurrentUser, Json, SESSION_COOKIE},
    middleware::rate_limit::rate_limit,
    state::AppState,
};

/// Returned by register, login and the OAuth callback
#[derive(Debug, Serialize, Deserialize, TS)]
pub struct SessionInfo {
    pub user: UserProfile,
    pub token: String,
}

pub(crate) fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Issue a session for `user` and attach it to the cookie jar
pub(crate) fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, SessionInfo), ApiError> {
    let token = state.auth.issue_session(&user)?;
    let jar = jar.add(session_cookie(token.clone()));
    Ok((
        jar,
        SessionInfo {
            user: user.into(),
            token,
        },
    ))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterUser>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<SessionInfo>>), ApiError> {
    let user = state.auth.register(&payload).await?;
    state
        .notifications
        .dispatch(NotificationService::welcome_email(&user));

    let (jar, session) = start_session(&state, jar, user)?;
    Ok((jar, ResponseJson(ApiResponse::success(session))))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<SessionInfo>>), ApiError> {
    let user = state.auth.login(&payload.username, &payload.password).await?;
    info!(username = %user.username, "User logged in");

    let (jar, session) = start_session(&state, jar, user)?;
    Ok((jar, ResponseJson(ApiResponse::success(session))))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, ResponseJson<ApiResponse<()>>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    (jar, ResponseJson(ApiResponse::success(())))
}

pub async fn me(CurrentUser(user): CurrentUser) -> ResponseJson<ApiResponse<UserProfile>> {
    ResponseJson(ApiResponse::success(user.into()))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
