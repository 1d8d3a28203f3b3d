use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Computes the lowercase hex HMAC-SHA256 of `payload` under `secret`.
///
/// # Arguments
///
/// * `secret` - The signing secret bytes.
/// * `payload` - The exact string to authenticate.
///
/// # Returns
///
/// A `Result` containing the hex-encoded signature.
pub fn sign(secret: &[u8], payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(format!("HMAC key setup failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compares two byte strings in constant time.
///
/// Lengths are checked first; equal-length inputs are compared without an
/// early exit on content.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Verifies that `signature` is the HMAC of `payload` under `secret`.
///
/// The comparison runs over the hex encodings in constant time.
pub fn verify(secret: &[u8], payload: &str, signature: &str) -> Result<bool> {
    let expected = sign(secret, payload)?;
    Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}
