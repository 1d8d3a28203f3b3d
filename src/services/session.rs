use chrono::Utc;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::signing;
use crate::error::{AppError, Result};
use crate::models::session::SessionToken;

/// Name of the cookie that carries the portal session token.
pub const SESSION_COOKIE: &str = "authToken";

/// A session issued after a successful password check.
///
/// Deliberately no `Debug`: the raw token must never end up in logs.
#[derive(Clone)]
pub struct IssuedSession {
    /// Serialized token destined for the cookie value.
    pub token: String,
    /// Cookie lifetime in whole seconds.
    pub max_age_secs: i64,
}

/// Issues and verifies portal session tokens.
///
/// Stateless by construction: trust lives entirely in the HMAC signature,
/// nothing is stored per session, and rotating the signing secret
/// invalidates every outstanding token at once.
#[derive(Clone)]
pub struct SessionAuthenticator {
    portal_password: Option<Zeroizing<String>>,
    signing_secret: Option<Zeroizing<String>>,
    ttl_hours: f64,
}

impl SessionAuthenticator {
    /// Builds the authenticator from configuration.
    ///
    /// The signing secret falls back to the portal password when no
    /// dedicated secret is configured.
    pub fn from_config(config: &Config) -> Self {
        let signing_secret = config
            .session_secret
            .clone()
            .or_else(|| config.portal_password.clone());
        Self {
            portal_password: config.portal_password.clone(),
            signing_secret,
            ttl_hours: config.session_ttl_hours,
        }
    }

    fn password(&self) -> Result<&Zeroizing<String>> {
        self.portal_password
            .as_ref()
            .ok_or_else(|| AppError::Configuration("PORTAL_PASSWORD is not set".to_string()))
    }

    fn secret(&self) -> Result<&Zeroizing<String>> {
        self.signing_secret.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "no session signing secret (SESSION_SECRET or PORTAL_PASSWORD)".to_string(),
            )
        })
    }

    /// Session lifetime in whole seconds, for the cookie `Max-Age`.
    pub fn ttl_secs(&self) -> i64 {
        (self.ttl_hours * 3600.0) as i64
    }

    fn ttl_ms(&self) -> i64 {
        (self.ttl_hours * 3_600_000.0) as i64
    }

    /// Checks the submitted portal password and issues a signed session.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The password submitted by the browser.
    ///
    /// # Returns
    ///
    /// A `Result` containing the issued session. Mismatches and empty
    /// submissions fail with the generic authentication error.
    pub fn issue(&self, candidate: &str) -> Result<IssuedSession> {
        self.issue_at(candidate, Utc::now().timestamp_millis())
    }

    fn issue_at(&self, candidate: &str, now_ms: i64) -> Result<IssuedSession> {
        let expected = self.password()?;
        if candidate.is_empty()
            || !signing::constant_time_eq(expected.as_bytes(), candidate.as_bytes())
        {
            return Err(AppError::Authentication);
        }

        // Saturates so an absurd configured TTL cannot wrap the expiry.
        let expires_at_ms = now_ms.saturating_add(self.ttl_ms());
        let payload = expires_at_ms.to_string();
        let signature = signing::sign(self.secret()?.as_bytes(), &payload)?;
        let token = SessionToken {
            expires_at_ms,
            signature,
        };

        Ok(IssuedSession {
            token: token.encode(),
            max_age_secs: self.ttl_secs(),
        })
    }

    /// Verifies a presented session token.
    ///
    /// Purely a function of the token, the current time and the signing
    /// secret. Malformed, expired and forged tokens all map to the same
    /// authentication error; only a missing signing secret is a
    /// configuration error.
    pub fn verify(&self, raw: &str) -> Result<()> {
        self.verify_at(raw, Utc::now().timestamp_millis())
    }

    fn verify_at(&self, raw: &str, now_ms: i64) -> Result<()> {
        let secret = self.secret()?;

        let Some(token) = SessionToken::parse(raw) else {
            return Err(AppError::Authentication);
        };
        if token.expires_at_ms <= now_ms {
            return Err(AppError::Authentication);
        }
        if !signing::verify(secret.as_bytes(), &token.signing_payload(), &token.signature)? {
            return Err(AppError::Authentication);
        }

        Ok(())
    }
}
