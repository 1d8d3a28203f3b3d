use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::header;
use serde::Deserialize;
use sonic_rs::JsonValueTrait;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::oauth::TokenCache;

/// Query parameters passed through to the helpdesk ticket listing.
#[derive(Debug, Deserialize, Default)]
pub struct TicketListQuery {
    pub from: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

impl TicketListQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(from) = self.from {
            params.push(("from", from.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(status) = self.status.as_ref() {
            params.push(("status", status.clone()));
        }
        if let Some(sort_by) = self.sort_by.as_ref() {
            params.push(("sortBy", sort_by.clone()));
        }
        params
    }
}

/// An attachment accepted from the browser, ready to forward.
pub struct AttachmentUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A raw helpdesk response: mirrored status plus the body bytes.
#[derive(Debug)]
pub struct DeskResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl DeskResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let body = response.bytes().await?;
        Ok(Self { status, body })
    }

    /// Extracts a safe, human-readable message from a helpdesk error body.
    ///
    /// Only whitelisted fields are surfaced to the browser; anything else in
    /// the body stays server-side.
    pub fn error_message(&self) -> String {
        let json: Option<sonic_rs::Value> = sonic_rs::from_slice(&self.body).ok();
        let field = |name: &str| -> Option<String> {
            json.as_ref()
                .and_then(|j| j.get(name).and_then(|v| v.as_str()).map(str::to_string))
        };

        field("message")
            .or_else(|| field("errorCode"))
            .unwrap_or_else(|| {
                format!("Helpdesk request failed with status {}", self.status.as_u16())
            })
    }
}

/// Client for the helpdesk REST API.
///
/// Every call carries the cached OAuth access token and the organization
/// header. A 401 from the helpdesk invalidates the cache and retries the
/// request exactly once with a forced refresh.
#[derive(Clone)]
pub struct DeskClient {
    http: reqwest::Client,
    base_url: String,
    org_id: Option<String>,
    tokens: TokenCache,
}

impl DeskClient {
    /// Builds the client from configuration.
    pub fn new(http: reqwest::Client, config: &Config, tokens: TokenCache) -> Self {
        Self {
            http,
            base_url: config.desk_base_url.trim_end_matches('/').to_string(),
            org_id: config.desk_org_id.clone(),
            tokens,
        }
    }

    fn org(&self) -> Result<&str> {
        self.org_id
            .as_deref()
            .ok_or_else(|| AppError::Configuration("DESK_ORG_ID is not set".to_string()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        token: &str,
        org: &str,
    ) -> reqwest::RequestBuilder {
        builder
            .header(header::AUTHORIZATION, format!("Zoho-oauthtoken {}", token))
            .header("orgId", org)
    }

    /// Sends a request built by `build`, retrying once with a fresh token
    /// when the helpdesk answers 401. No other status triggers a retry.
    async fn send_authorized<F>(&self, build: F) -> Result<DeskResponse>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.tokens.acquire(false).await?;
        let response = build(&token.access_token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return DeskResponse::read(response).await;
        }

        tracing::warn!("🔁 Helpdesk rejected the access token, refreshing once");
        self.tokens.invalidate().await;
        let token = self.tokens.acquire(true).await?;
        let response = build(&token.access_token).send().await?;
        DeskResponse::read(response).await
    }

    /// Lists tickets with passthrough filters.
    pub async fn list_tickets(&self, query: &TicketListQuery) -> Result<DeskResponse> {
        let org = self.org()?.to_string();
        let url = self.endpoint("/api/v1/tickets");
        let params = query.to_params();

        self.send_authorized(|token| {
            self.authorized(self.http.get(&url).query(&params), token, &org)
        })
        .await
    }

    /// Fetches a ticket's change history.
    pub async fn ticket_history(&self, ticket_id: &str) -> Result<DeskResponse> {
        let org = self.org()?.to_string();
        let url = self.endpoint(&format!("/api/v1/tickets/{}/History", ticket_id));

        self.send_authorized(|token| self.authorized(self.http.get(&url), token, &org))
            .await
    }

    /// Fetches a ticket's conversation list.
    pub async fn ticket_conversations(&self, ticket_id: &str) -> Result<DeskResponse> {
        let org = self.org()?.to_string();
        let url = self.endpoint(&format!("/api/v1/tickets/{}/conversations", ticket_id));

        self.send_authorized(|token| self.authorized(self.http.get(&url), token, &org))
            .await
    }

    /// Fetches the full content of one conversation thread.
    pub async fn thread_message(&self, ticket_id: &str, thread_id: &str) -> Result<DeskResponse> {
        let org = self.org()?.to_string();
        let url = self.endpoint(&format!(
            "/api/v1/tickets/{}/threads/{}",
            ticket_id, thread_id
        ));

        self.send_authorized(|token| self.authorized(self.http.get(&url), token, &org))
            .await
    }

    /// Forwards an attachment as multipart with part name `file`.
    pub async fn upload_attachment(
        &self,
        ticket_id: &str,
        upload: &AttachmentUpload,
    ) -> Result<DeskResponse> {
        let org = self.org()?.to_string();
        let url = self.endpoint(&format!("/api/v1/tickets/{}/attachments", ticket_id));

        self.send_authorized(|token| {
            let part = reqwest::multipart::Part::bytes(upload.bytes.to_vec())
                .file_name(upload.filename.clone());
            let part = match part.mime_str(&upload.content_type) {
                Ok(part) => part,
                // Unusable content type: forward with octet-stream semantics.
                Err(_) => reqwest::multipart::Part::bytes(upload.bytes.to_vec())
                    .file_name(upload.filename.clone()),
            };
            let form = reqwest::multipart::Form::new().part("file", part);
            self.authorized(self.http.post(&url).multipart(form), token, &org)
        })
        .await
    }

    /// Updates a ticket's resolution field.
    pub async fn update_resolution(&self, ticket_id: &str, resolution: &str) -> Result<DeskResponse> {
        let org = self.org()?.to_string();
        let url = self.endpoint(&format!("/api/v1/tickets/{}", ticket_id));
        let payload = sonic_rs::json!({ "resolution": resolution });

        self.send_authorized(|token| {
            self.authorized(self.http.patch(&url).json(&payload), token, &org)
        })
        .await
    }
}
