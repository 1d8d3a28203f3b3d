use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::services::desk::DeskClient;
use crate::services::oauth::TokenCache;
use crate::services::session::SessionAuthenticator;

/// Timeout applied to every outbound OAuth/helpdesk request.
const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// Issues and verifies portal sessions.
    pub sessions: SessionAuthenticator,
    /// Process-wide upstream token cache.
    pub tokens: TokenCache,
    /// The helpdesk API client.
    pub desk: DeskClient,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// One `reqwest::Client` (one connection pool) is built here and shared
    /// by the token cache and the helpdesk client.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()?;
        tracing::info!("✅ Outbound HTTP client initialized ({}s timeout)", UPSTREAM_TIMEOUT_SECS);

        let sessions = SessionAuthenticator::from_config(config);
        tracing::info!("✅ Session authenticator initialized");

        let tokens = TokenCache::new(http.clone(), config);
        tracing::info!("✅ Upstream token cache initialized");

        let desk = DeskClient::new(http, config, tokens.clone());
        tracing::info!("✅ Helpdesk client initialized");

        Ok(AppState {
            config: Arc::new(config.clone()),
            sessions,
            tokens,
            desk,
        })
    }
}
