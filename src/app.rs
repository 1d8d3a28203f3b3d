use std::time::Duration;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http::{HeaderValue, Method, header};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Maximum accepted attachment upload size.
const MAX_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

/// CORS preflight cache lifetime.
const CORS_MAX_AGE_SECS: u64 = 86_400;

/// CORS for the credentialed surface: session endpoints and ticket writes.
/// Only the configured portal origin may send cookies.
fn restricted_cors(portal_origin: &str) -> CorsLayer {
    let origin = portal_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!("⚠️ PORTAL_ORIGIN is not a valid origin, falling back to localhost");
        HeaderValue::from_static("http://localhost:3000")
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

/// CORS for the read-only listing surface: any origin, no credentials.
fn public_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

/// Assembles the application router.
///
/// Sub-routers are split by auth/CORS class: the session endpoints (portal
/// origin, no session required), the read-only proxies (any origin, session
/// required) and the write proxies (portal origin, session required).
pub fn router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route(
            "/api/session",
            get(handlers::session::session_status).post(handlers::session::login),
        )
        .layer(restricted_cors(&state.config.portal_origin))
        .with_state(state.clone());

    let read_routes = Router::new()
        .route("/api/tickets", get(handlers::tickets::list_tickets))
        .route(
            "/api/tickets/{ticket_id}/history",
            get(handlers::tickets::ticket_history),
        )
        .route(
            "/api/tickets/{ticket_id}/conversations",
            get(handlers::tickets::ticket_conversations),
        )
        .route(
            "/api/tickets/{ticket_id}/threads/{thread_id}",
            get(handlers::tickets::thread_message),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_session,
        ))
        .layer(public_cors())
        .with_state(state.clone());

    let write_routes = Router::new()
        .route(
            "/api/tickets/{ticket_id}/attachments",
            post(handlers::tickets::upload_attachment),
        )
        .route(
            "/api/tickets/{ticket_id}/resolution",
            post(handlers::tickets::update_resolution),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_session,
        ))
        .layer(restricted_cors(&state.config.portal_origin))
        .layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .merge(session_routes)
        .merge(read_routes)
        .merge(write_routes)
        .layer(
            TraceLayer::new_for_http()
                // Spans must not capture headers: the Cookie header carries
                // the session token.
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(CompressionLayer::new())
}

/// Liveness probe.
async fn health() -> Json<sonic_rs::Value> {
    Json(sonic_rs::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
