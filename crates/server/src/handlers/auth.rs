//! Auth handlers: signup/login/logout, the current-identity endpoint and
//! the gateway verification endpoint consumed by the reverse proxy.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use chatme_common::UserInfo;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{extract_token, Identity, AUTH_COOKIE};
use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserInfo,
    pub token: String,
}

fn session_cookie(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .map_err(|e| Error::Internal(format!("failed to build session cookie: {e}")))
}

fn auth_response(state: &AppState, user: UserInfo) -> Result<(HeaderMap, Json<AuthResponse>)> {
    let token = state.verifier.issue(&user.id, &user.email, &user.name)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&token)?);

    Ok((headers, Json(AuthResponse { user, token })))
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>)> {
    info!("POST /api/auth/signup - {}", req.email);

    let user = state.users.register(&req.email, &req.name, &req.password)?;
    auth_response(&state, user)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>)> {
    info!("POST /api/auth/login - {}", req.email);

    let user = state.users.authenticate(&req.email, &req.password)?;
    info!("user {} logged in", user.name);
    auth_response(&state, user)
}

/// POST /api/auth/logout
///
/// Credentials are stateless, so logout just clears the cookie; the client
/// drops its identity and tears down the notification channel.
pub async fn logout() -> Result<(HeaderMap, StatusCode)> {
    info!("POST /api/auth/logout");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("auth_token=; Path=/; HttpOnly; Max-Age=0"),
    );
    Ok((headers, StatusCode::OK))
}

/// GET /api/auth/me
pub async fn me(ctx: Ctx, State(state): State<AppState>) -> Result<Json<UserInfo>> {
    let user = state.users.get(ctx.user_id())?;
    Ok(Json(user))
}

/// GET /auth/verify
///
/// Gateway contract: 200 with identity attributes surfaced as response
/// headers (for the reverse proxy to forward upstream) and body, or 401 on
/// any verification failure. Deliberately outside the auth middleware so
/// failures map straight to the credential error, not a generic rejection.
pub async fn verify_identity(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<Identity>)> {
    let token = extract_token(&headers).ok_or(Error::Unauthenticated)?;
    let identity = state.verifier.verify(&token)?;

    let mut response_headers = HeaderMap::new();
    for (name, value) in [
        ("x-auth-user-id", identity.user_id.as_str()),
        ("x-auth-email", identity.email.as_str()),
        ("x-auth-display-name", identity.display_name.as_str()),
    ] {
        response_headers.insert(
            name,
            HeaderValue::from_str(value)
                .map_err(|e| Error::Internal(format!("unrepresentable identity attribute: {e}")))?,
        );
    }

    Ok((response_headers, Json(identity)))
}
