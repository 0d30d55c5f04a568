use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm tag GitHub-style senders put in front of the hex digest.
pub const SHA256_PREFIX: &str = "sha256=";

/// Hex-encoded HMAC-SHA256 of `body` keyed by `secret`.
pub fn hex_digest(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction never fails.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// `sha256=<hex>` header value for `body`, as a sender would compute it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    format!("{SHA256_PREFIX}{}", hex_digest(secret, body))
}

/// Compares two byte strings without exiting early on the first difference.
///
/// A length mismatch returns immediately: the length of a hex digest is
/// public, so it carries no secret-dependent timing.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Checks a hex digest (already stripped of its prefix) against `body`.
pub fn verify_hex(secret: &str, body: &[u8], provided_hex: &[u8]) -> bool {
    let expected = hex_digest(secret, body);
    !expected.is_empty() && constant_time_eq(expected.as_bytes(), provided_hex)
}
