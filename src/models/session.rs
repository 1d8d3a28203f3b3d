/// A portal session token in its wire form.
///
/// Serialized as `"<expiresAt>.<signature>"` where `expiresAt` is the expiry
/// instant in milliseconds since the Unix epoch rendered as a decimal
/// integer, and `signature` is the lowercase hex HMAC-SHA256 of exactly that
/// decimal string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Absolute expiry instant, milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
    /// Hex HMAC-SHA256 over the decimal expiry string.
    pub signature: String,
}

impl SessionToken {
    /// Parses the wire form.
    ///
    /// Returns `None` for any malformed shape: wrong part count, or an
    /// expiry that is not a canonically spelled decimal integer (so
    /// `+123` and `0042` do not alias a token signed over `123` and `42`).
    /// Malformed tokens are simply invalid, never an error.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 2 {
            return None;
        }
        let expires_at_ms = parts[0].parse::<i64>().ok()?;
        if expires_at_ms.to_string() != parts[0] {
            return None;
        }
        Some(Self {
            expires_at_ms,
            signature: parts[1].to_string(),
        })
    }

    /// The exact string the signature authenticates.
    pub fn signing_payload(&self) -> String {
        self.expires_at_ms.to_string()
    }

    /// Renders the wire form.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.expires_at_ms, self.signature)
    }
}
