use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{error::ApiError, extractors::session_token, state::AppState};

const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Who a request is counted against: the session's user, then the proxy's
/// client address, then the socket peer
pub fn client_key(state: &AppState, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(claims) = session_token(headers).and_then(|t| state.auth.verify_session(&t).ok()) {
        return format!("user:{}", claims.sub);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return format!("ip:{ip}");
    }

    match peer {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}

async fn limit(state: &AppState, request: Request, next: Next) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(state, request.headers(), peer);

    let remaining = state.rate_limiter.check(&key).inspect_err(|e| {
        debug!(client = %key, path = %request.uri().path(), retry_after = ?e.retry_after, "Rate limited");
    })?;

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(remaining));
    Ok(response)
}

/// Counts every request
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limit(&state, request, next).await
}

/// Counts only requests that change something; reads pass straight through
pub async fn rate_limit_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(request).await);
    }
    limit(&state, request, next).await
}
