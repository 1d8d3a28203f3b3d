use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A required configuration value is missing or unusable. The detail
    /// string is logged server-side only; responses stay generic.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Portal authentication failed. Deliberately carries no detail so the
    /// response cannot distinguish a wrong password from a bad or expired
    /// session token.
    #[error("Authentication failed")]
    Authentication,

    /// The OAuth host rejected or failed the token exchange.
    #[error("Token exchange failed: {0}")]
    UpstreamOAuth(String),

    /// The OAuth host is rate limiting token exchanges.
    #[error("Upstream rate limited: {0}")]
    RateLimited(String),

    /// The helpdesk API answered with an error status.
    #[error("Helpdesk error ({status}): {message}")]
    Downstream { status: StatusCode, message: String },

    /// Outbound HTTP failed before any response was produced.
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Configuration(ref detail) => {
                tracing::error!("Configuration error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }

            AppError::Authentication => {
                tracing::warn!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }

            AppError::UpstreamOAuth(ref detail) => {
                tracing::error!("Token exchange failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to authenticate with the helpdesk service".to_string(),
                )
            }

            AppError::RateLimited(ref detail) => {
                tracing::warn!("Upstream rate limited: {}", detail);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "The helpdesk service is rate limiting requests, retry shortly".to_string(),
                )
            }

            AppError::Downstream { status, ref message } => {
                tracing::warn!("Helpdesk error {}: {}", status, message);
                (status, message.clone())
            }

            AppError::Http(ref e) => {
                tracing::error!("Upstream request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upstream request failed".to_string(),
                )
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Multipart(ref msg) => {
                tracing::debug!("Multipart error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({ "error": message }))
            .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
