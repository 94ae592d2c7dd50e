//! Cookie-session auth endpoints over the user store

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::store::users::{StoreError, UserRecord, UserStore};

/// Session cookie name, shared with the WebSocket upgrade
pub const SESSION_COOKIE: &str = "sid";

const MIN_PASSWORD_LEN: usize = 6;

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username")]
    InvalidUsername,

    #[error("invalid password")]
    InvalidPassword,

    #[error("user exists")]
    UserExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("server error")]
    Store(#[from] StoreError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidUsername | AuthError::InvalidPassword => StatusCode::BAD_REQUEST,
            AuthError::UserExists => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AuthError::Store(err) = &self {
            error!(error = %err, "Auth store failure");
        }

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub username: String,
    pub password: String,
    pub new_password: String,
}

/// Identity returned by signup/login/me
#[derive(Serialize)]
pub struct Identity {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Deserialize)]
pub struct CheckUsernameQuery {
    pub u: String,
}

#[derive(Serialize)]
pub struct CheckUsernameResponse {
    pub available: bool,
}

fn validate(username: &str, password: &str) -> Result<(), AuthError> {
    if !UserStore::valid_username(username) {
        return Err(AuthError::InvalidUsername);
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidPassword);
    }
    Ok(())
}

/// Build a response that also establishes the session cookie.
fn session_response(status: StatusCode, sid: Uuid, record: &UserRecord) -> Response {
    let cookie = format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax");
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(Identity {
            username: record.username.clone(),
            wins: record.wins,
            losses: record.losses,
        }),
    )
        .into_response()
}

fn session_id(cookies: &Option<axum_extra::TypedHeader<axum_extra::headers::Cookie>>) -> Option<Uuid> {
    cookies
        .as_ref()
        .and_then(|header| header.get(SESSION_COOKIE))
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// POST /api/signup - create an account and log it in
pub async fn signup_handler(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Response, AuthError> {
    let username = req.username.trim();
    validate(username, &req.password)?;

    let record = match state.users.create(username, &req.password).await {
        Ok(record) => record,
        Err(StoreError::UserExists) => return Err(AuthError::UserExists),
        Err(StoreError::InvalidUsername) => return Err(AuthError::InvalidUsername),
        Err(err) => return Err(AuthError::Store(err)),
    };

    let sid = state.sessions.create(&record.username);
    info!(username = %record.username, "New account created");

    Ok(session_response(StatusCode::CREATED, sid, &record))
}

/// POST /api/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Response, AuthError> {
    let username = req.username.trim();
    validate(username, &req.password)?;

    let record = state
        .users
        .verify(username, &req.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let sid = state.sessions.create(&record.username);
    info!(username = %record.username, "Login");

    Ok(session_response(StatusCode::OK, sid, &record))
}

/// POST /api/logout - revoke the session and expire the cookie
pub async fn logout_handler(
    State(state): State<AppState>,
    cookies: Option<axum_extra::TypedHeader<axum_extra::headers::Cookie>>,
) -> Response {
    if let Some(sid) = session_id(&cookies) {
        if let Some(username) = state.sessions.revoke(sid) {
            info!(username = %username, "Logout");
        }
    }

    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}

/// GET /api/me - identity for the current session
pub async fn me_handler(
    State(state): State<AppState>,
    cookies: Option<axum_extra::TypedHeader<axum_extra::headers::Cookie>>,
) -> Result<Json<Identity>, AuthError> {
    let sid = session_id(&cookies).ok_or(AuthError::NotLoggedIn)?;
    let username = state.sessions.lookup(sid).ok_or(AuthError::NotLoggedIn)?;
    let record = state
        .users
        .load(&username)
        .await?
        .ok_or(AuthError::NotLoggedIn)?;

    Ok(Json(Identity {
        username: record.username,
        wins: record.wins,
        losses: record.losses,
    }))
}

/// POST /api/password - verify the old password, then re-hash
pub async fn password_handler(
    State(state): State<AppState>,
    Json(req): Json<PasswordChange>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let username = req.username.trim();
    validate(username, &req.new_password)?;

    let record = state
        .users
        .verify(username, &req.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    state
        .users
        .set_password(&record.username, &req.new_password)
        .await?;

    info!(username = %record.username, "Password changed");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /api/check-username?u= - signup form helper
pub async fn check_username_handler(
    State(state): State<AppState>,
    Query(query): Query<CheckUsernameQuery>,
) -> Json<CheckUsernameResponse> {
    let name = query.u.trim();
    let available = UserStore::valid_username(name) && !state.users.exists(name).await;
    Json(CheckUsernameResponse { available })
}
