use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use sonic_rs::JsonValueTrait;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    services::session::SESSION_COOKIE,
    state::AppState,
};

/// The response payload for session endpoints.
#[derive(Serialize)]
pub struct SessionResponse {
    pub ok: bool,
}

/// Creates the session cookie with the attributes the portal relies on.
fn create_session_cookie(value: String, max_age_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);

    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");

    cookie
}

/// Reports whether the caller holds a valid session.
#[axum::debug_handler]
pub async fn session_status(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<SessionResponse>> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(AppError::Authentication)?;

    state.sessions.verify(&token)?;

    Ok(Json(SessionResponse { ok: true }))
}

/// Handles portal login.
///
/// The body is parsed by hand so that non-JSON payloads fail with the
/// descriptive 400 contract instead of an extractor rejection.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    body: Bytes,
) -> Result<Json<SessionResponse>> {
    let json: sonic_rs::Value = sonic_rs::from_slice(&body)
        .map_err(|_| AppError::Validation("Request body must be JSON".to_string()))?;

    let password = json
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Validation("Missing password field".to_string()))?;

    let issued = state.sessions.issue(password)?;
    cookies.add(create_session_cookie(issued.token, issued.max_age_secs));

    tracing::info!("✅ Portal session issued");
    Ok(Json(SessionResponse { ok: true }))
}
