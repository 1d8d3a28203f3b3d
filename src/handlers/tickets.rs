use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sonic_rs::JsonValueTrait;

use crate::{
    error::{AppError, Result},
    services::desk::{AttachmentUpload, DeskResponse, TicketListQuery},
    state::AppState,
    validation::tickets::{validate_limit, validate_record_id},
};

/// Renders a helpdesk response for the browser.
///
/// Successful responses mirror the upstream status and body, except that
/// list-shaped reads turn the helpdesk's 204-for-empty into an empty JSON
/// listing. Failures surface through the shared error type with the
/// mirrored status and a safe message.
fn forward(resp: DeskResponse, list_shaped: bool) -> Result<Response> {
    if list_shaped && resp.status == StatusCode::NO_CONTENT {
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"data":[]}"#,
        )
            .into_response());
    }

    if resp.status.is_success() {
        return Ok((
            resp.status,
            [(header::CONTENT_TYPE, "application/json")],
            resp.body,
        )
            .into_response());
    }

    Err(AppError::Downstream {
        status: resp.status,
        message: resp.error_message(),
    })
}

/// Lists helpdesk tickets with passthrough filters.
#[axum::debug_handler]
pub async fn list_tickets(
    State(state): State<AppState>,
    query: std::result::Result<Query<TicketListQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    validate_limit(query.limit)?;

    forward(state.desk.list_tickets(&query).await?, true)
}

/// Fetches a ticket's change history.
#[axum::debug_handler]
pub async fn ticket_history(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Response> {
    validate_record_id("ticket_id", &ticket_id)?;

    forward(state.desk.ticket_history(&ticket_id).await?, true)
}

/// Fetches a ticket's conversation list.
#[axum::debug_handler]
pub async fn ticket_conversations(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Response> {
    validate_record_id("ticket_id", &ticket_id)?;

    forward(state.desk.ticket_conversations(&ticket_id).await?, true)
}

/// Fetches the full content of one conversation thread.
#[axum::debug_handler]
pub async fn thread_message(
    State(state): State<AppState>,
    Path((ticket_id, thread_id)): Path<(String, String)>,
) -> Result<Response> {
    validate_record_id("ticket_id", &ticket_id)?;
    validate_record_id("thread_id", &thread_id)?;

    forward(state.desk.thread_message(&ticket_id, &thread_id).await?, false)
}

/// Accepts a browser upload and forwards it to the ticket.
#[axum::debug_handler]
pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    validate_record_id("ticket_id", &ticket_id)?;

    let mut upload: Option<AttachmentUpload> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("attachment").to_string();
        let declared = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Multipart(format!("Failed to read attachment: {}", e)))?;

        // Prefer the browser's content type, then sniff, then octet-stream.
        let content_type = declared
            .or_else(|| infer::get(&bytes).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        upload = Some(AttachmentUpload {
            filename,
            content_type,
            bytes,
        });
        break;
    }

    let upload = upload.ok_or_else(|| AppError::Multipart("Missing file part".to_string()))?;
    if upload.bytes.is_empty() {
        return Err(AppError::Multipart("Attachment is empty".to_string()));
    }

    tracing::info!(
        "📎 Forwarding attachment to ticket {} ({} bytes)",
        ticket_id,
        upload.bytes.len()
    );
    forward(state.desk.upload_attachment(&ticket_id, &upload).await?, false)
}

/// Updates a ticket's resolution field.
#[axum::debug_handler]
pub async fn update_resolution(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    body: Bytes,
) -> Result<Response> {
    validate_record_id("ticket_id", &ticket_id)?;

    let json: sonic_rs::Value = sonic_rs::from_slice(&body)
        .map_err(|_| AppError::Validation("Request body must be JSON".to_string()))?;
    let resolution = json
        .get("resolution")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Validation("Missing resolution field".to_string()))?;
    if resolution.trim().is_empty() {
        return Err(AppError::Validation(
            "resolution must not be empty".to_string(),
        ));
    }

    forward(
        state.desk.update_resolution(&ticket_id, resolution).await?,
        false,
    )
}
