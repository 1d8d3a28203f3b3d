use std::env;
use zeroize::Zeroizing;

/// Fallback session lifetime when `SESSION_TTL_HOURS` is absent or unusable.
pub const DEFAULT_SESSION_TTL_HOURS: f64 = 24.0;

/// Default OAuth host for the token exchange.
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.zoho.com";

/// Default helpdesk API host.
pub const DEFAULT_DESK_BASE_URL: &str = "https://desk.zoho.com";

/// The application's configuration.
///
/// Credential fields are optional: the process boots without them and the
/// affected endpoints answer with a configuration error per request. This
/// mirrors an environment where configuration is attached to the deployment,
/// not baked into the binary.
#[derive(Clone)]
pub struct Config {
    /// The shared portal password.
    pub portal_password: Option<Zeroizing<String>>,
    /// The session token signing secret. Falls back to the portal password
    /// when unset.
    pub session_secret: Option<Zeroizing<String>>,
    /// Session lifetime in hours. Fractional values are honored.
    pub session_ttl_hours: f64,
    /// OAuth client id for the helpdesk token exchange.
    pub oauth_client_id: Option<String>,
    /// OAuth client secret.
    pub oauth_client_secret: Option<Zeroizing<String>>,
    /// Long-lived OAuth refresh token.
    pub oauth_refresh_token: Option<Zeroizing<String>>,
    /// Base URL of the OAuth host.
    pub accounts_base_url: String,
    /// Base URL of the helpdesk API.
    pub desk_base_url: String,
    /// Helpdesk organization id, sent as the `orgId` header.
    pub desk_org_id: Option<String>,
    /// Browser origin allowed to make credentialed requests.
    pub portal_origin: String,
    /// Socket address the server binds to.
    pub bind_addr: String,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// Never fails on missing credentials; it logs which optional keys are
    /// absent (names only) and leaves the fields unset.
    ///
    /// # Returns
    ///
    /// The assembled `Config`.
    pub fn from_env() -> Self {
        let portal_password = optional_secret("PORTAL_PASSWORD");
        if portal_password.is_none() {
            tracing::warn!("⚠️ PORTAL_PASSWORD is not set; session endpoints will be unavailable");
        }

        let session_secret = optional_secret("SESSION_SECRET");

        let oauth_client_id = optional("OAUTH_CLIENT_ID");
        let oauth_client_secret = optional_secret("OAUTH_CLIENT_SECRET");
        let oauth_refresh_token = optional_secret("OAUTH_REFRESH_TOKEN");
        for (name, present) in [
            ("OAUTH_CLIENT_ID", oauth_client_id.is_some()),
            ("OAUTH_CLIENT_SECRET", oauth_client_secret.is_some()),
            ("OAUTH_REFRESH_TOKEN", oauth_refresh_token.is_some()),
        ] {
            if !present {
                tracing::warn!("⚠️ {} is not set; helpdesk endpoints will be unavailable", name);
            }
        }

        let desk_org_id = optional("DESK_ORG_ID");
        if desk_org_id.is_none() {
            tracing::warn!("⚠️ DESK_ORG_ID is not set; helpdesk endpoints will be unavailable");
        }

        Self {
            portal_password,
            session_secret,
            session_ttl_hours: parse_ttl_hours(optional("SESSION_TTL_HOURS").as_deref()),
            oauth_client_id,
            oauth_client_secret,
            oauth_refresh_token,
            accounts_base_url: optional("ACCOUNTS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_BASE_URL.to_string()),
            desk_base_url: optional("DESK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_DESK_BASE_URL.to_string()),
            desk_org_id,
            portal_origin: optional("PORTAL_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
        }
    }
}

/// Reads an environment variable, treating empty values as absent.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads a secret environment variable into zeroizing storage.
fn optional_secret(name: &str) -> Option<Zeroizing<String>> {
    optional(name).map(Zeroizing::new)
}

/// Resolves the session TTL in hours.
///
/// Missing, unparsable, non-finite or non-positive values fall back to
/// [`DEFAULT_SESSION_TTL_HOURS`].
fn parse_ttl_hours(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return DEFAULT_SESSION_TTL_HOURS;
    };
    match raw.trim().parse::<f64>() {
        Ok(hours) if hours.is_finite() && hours > 0.0 => hours,
        _ => DEFAULT_SESSION_TTL_HOURS,
    }
}
