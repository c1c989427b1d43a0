use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the `X-Webhook-Signature` header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compare two secrets without leaking the position of the first mismatch.
/// Inputs of different length compare unequal.
pub fn secure_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check an `X-Webhook-Signature` header (`sha256=<hex>`) against the body.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(provided) = header.and_then(|h| h.strip_prefix(SIGNATURE_PREFIX)) else {
        return false;
    };
    if provided.is_empty() {
        return false;
    }
    let expected = compute_signature(secret, body);
    !expected.is_empty() && secure_compare(provided, &expected)
}

/// Check a plain shared secret. An empty provided value never matches.
pub fn verify_secret(expected: &str, provided: Option<&str>) -> bool {
    match provided {
        Some(provided) if !provided.is_empty() => secure_compare(provided, expected),
        _ => false,
    }
}
