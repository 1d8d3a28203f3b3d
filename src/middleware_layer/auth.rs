use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{error::AppError, services::session::SESSION_COOKIE, state::AppState};

/// Extracts the session token from the request cookies.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// An `Option` containing the raw token if the cookie is present.
fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// A middleware that requires a valid portal session.
///
/// Missing, malformed, expired and forged tokens all produce the same
/// uninformative 401 body; only a missing signing secret surfaces as a
/// configuration error.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an `AppError` rendered by the shared error surface.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking portal session...");

    let token = extract_session_token(&cookies).ok_or_else(|| {
        tracing::debug!("❌ No session cookie found");
        AppError::Authentication
    })?;

    state.sessions.verify(&token)?;

    tracing::debug!("✅ Portal session verified");
    Ok(next.run(request).await)
}
