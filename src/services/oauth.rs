use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use sonic_rs::JsonValueTrait;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::AppError;

/// Milliseconds subtracted from the nominal expiry before a cached token is
/// treated as already expired.
pub const EXPIRY_SAFETY_MARGIN_MS: i64 = 60_000;

/// Assumed lifetime in seconds when the OAuth host omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3_600;

/// An upstream access token held in the process-wide cache.
///
/// Deliberately no `Debug`: the bearer token must never end up in logs.
#[derive(Clone)]
pub struct CachedToken {
    /// The bearer token for helpdesk calls.
    pub access_token: String,
    /// Expiry instant in epoch milliseconds, measured from refresh start.
    pub expires_at_ms: i64,
}

/// Failure modes of the token exchange.
///
/// Cloneable so that every caller joined on a single flight observes the
/// same outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// OAuth credentials are not configured.
    #[error("OAuth configuration incomplete: {0}")]
    Config(String),
    /// The OAuth host is rate limiting token exchanges.
    #[error("OAuth host is rate limiting: {0}")]
    RateLimited(String),
    /// The OAuth host rejected the exchange or returned an unusable body.
    #[error("token exchange rejected: {0}")]
    Rejected(String),
    /// The request never produced a response.
    #[error("token exchange transport failure: {0}")]
    Transport(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Config(detail) => AppError::Configuration(detail),
            TokenError::RateLimited(detail) => AppError::RateLimited(detail),
            TokenError::Rejected(detail) => AppError::UpstreamOAuth(detail),
            TokenError::Transport(detail) => AppError::UpstreamOAuth(detail),
        }
    }
}

type RefreshResult = std::result::Result<CachedToken, TokenError>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

#[derive(Default)]
struct CacheState {
    token: Option<CachedToken>,
    in_flight: Option<RefreshFuture>,
}

struct CacheInner {
    http: reqwest::Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<Zeroizing<String>>,
    refresh_token: Option<Zeroizing<String>>,
    state: Mutex<CacheState>,
}

/// Process-wide cache for the upstream OAuth access token.
///
/// Refreshes run single flight: the first caller to find the cache cold (or
/// stale) becomes the leader and performs the exchange; every caller that
/// races in behind it awaits the same shared future and observes the same
/// token or the same error. The mutex only guards the cache fields, it is
/// never held across the network call.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<CacheInner>,
}

impl TokenCache {
    /// Builds the cache from configuration.
    ///
    /// Missing credentials do not fail here; they surface as configuration
    /// errors on the acquire that needs them.
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                http,
                token_url: format!(
                    "{}/oauth/v2/token",
                    config.accounts_base_url.trim_end_matches('/')
                ),
                client_id: config.oauth_client_id.clone(),
                client_secret: config.oauth_client_secret.clone(),
                refresh_token: config.oauth_refresh_token.clone(),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Returns a usable access token, refreshing if needed.
    ///
    /// # Arguments
    ///
    /// * `force_refresh` - Skip the cached token and exchange anew. An
    ///   already in-flight refresh is still joined rather than duplicated.
    ///
    /// # Returns
    ///
    /// A `Result` containing the bearer token string.
    pub async fn acquire(&self, force_refresh: bool) -> RefreshResult {
        let refresh = {
            let mut state = self.inner.state.lock().await;

            if !force_refresh {
                if let Some(token) = state.token.as_ref() {
                    if Utc::now().timestamp_millis()
                        < token.expires_at_ms - EXPIRY_SAFETY_MARGIN_MS
                    {
                        return Ok(token.clone());
                    }
                }
            }

            match state.in_flight.as_ref() {
                Some(pending) => {
                    tracing::debug!("🔑 Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    tracing::debug!("🔑 Starting token refresh");
                    let pending: RefreshFuture = self.clone().run_refresh().boxed().shared();
                    state.in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        refresh.await
    }

    /// Drops the cached token. The next acquire performs a fresh exchange.
    pub async fn invalidate(&self) {
        let mut state = self.inner.state.lock().await;
        state.token = None;
    }

    /// Performs one exchange and settles the cache. Always clears the
    /// in-flight marker, success or failure, so the cache cannot get stuck.
    async fn run_refresh(self) -> RefreshResult {
        let started_at_ms = Utc::now().timestamp_millis();
        let outcome = self.exchange_refresh_token(started_at_ms).await;

        let mut state = self.inner.state.lock().await;
        state.in_flight = None;
        match outcome {
            Ok(token) => {
                tracing::info!("🔑 Upstream access token refreshed");
                state.token = Some(token.clone());
                Ok(token)
            }
            Err(err) => {
                tracing::warn!("❌ Token refresh failed: {}", err);
                state.token = None;
                Err(err)
            }
        }
    }

    /// The OAuth refresh-token grant against the accounts host.
    async fn exchange_refresh_token(&self, started_at_ms: i64) -> RefreshResult {
        let client_id = self
            .inner
            .client_id
            .as_deref()
            .ok_or_else(|| TokenError::Config("OAUTH_CLIENT_ID is not set".to_string()))?;
        let client_secret = self
            .inner
            .client_secret
            .as_ref()
            .ok_or_else(|| TokenError::Config("OAUTH_CLIENT_SECRET is not set".to_string()))?;
        let refresh_token = self
            .inner
            .refresh_token
            .as_ref()
            .ok_or_else(|| TokenError::Config("OAUTH_REFRESH_TOKEN is not set".to_string()))?;

        let params = [
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .inner
            .http
            .post(&self.inner.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TokenError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body));
        }

        let json: sonic_rs::Value = match sonic_rs::from_slice(&body) {
            Ok(json) => json,
            Err(e) => {
                return Err(TokenError::Rejected(format!(
                    "unparsable token response: {}",
                    e
                )));
            }
        };

        // The OAuth host answers 200 with an error body in some failure
        // modes; a success without an access_token is still a failure.
        let Some(access_token) = json.get("access_token").and_then(|v| v.as_str()) else {
            return Err(classify_failure(status.as_u16(), &body));
        };

        let expires_in = json
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        Ok(CachedToken {
            access_token: access_token.to_string(),
            expires_at_ms: started_at_ms + expires_in * 1000,
        })
    }

    #[cfg(test)]
    async fn prime(&self, access_token: &str, expires_at_ms: i64) {
        let mut state = self.inner.state.lock().await;
        state.token = Some(CachedToken {
            access_token: access_token.to_string(),
            expires_at_ms,
        });
    }

    #[cfg(test)]
    async fn cached_expires_at(&self) -> Option<i64> {
        let state = self.inner.state.lock().await;
        state.token.as_ref().map(|t| t.expires_at_ms)
    }
}

/// Sorts an exchange failure into rate limiting vs plain rejection.
fn classify_failure(status: u16, body: &[u8]) -> TokenError {
    let json: Option<sonic_rs::Value> = sonic_rs::from_slice(body).ok();
    let field = |name: &str| -> String {
        json.as_ref()
            .and_then(|j| j.get(name).and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or_default()
    };

    let error = field("error");
    let description = field("error_description");

    let rate_limited = [&error, &description]
        .iter()
        .any(|text| text.to_lowercase().contains("too many requests"));
    if rate_limited {
        let detail = if description.is_empty() { error } else { description };
        return TokenError::RateLimited(detail);
    }

    let detail = if !description.is_empty() {
        description
    } else if !error.is_empty() {
        error
    } else {
        let text = String::from_utf8_lossy(body);
        text.chars().take(200).collect()
    };

    TokenError::Rejected(format!("status {}: {}", status, detail))
}
