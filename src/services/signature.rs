//! Webhook signature verification.
//!
//! Meta signs each delivery with HMAC-SHA256 over the exact raw request
//! bytes, keyed by the app secret, and sends it as
//! `X-Hub-Signature-256: sha256=<hex>`. Verification must run against the
//! untouched bytes before any JSON parsing; re-serialization changes the
//! byte stream and invalidates the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Returns true only for a well-formed header carrying a valid signature.
/// Missing header, missing prefix, bad hex, or an empty secret all verify
/// as false; the caller rejects with 403 (or 500 for the unconfigured
/// secret) without processing the body.
pub fn verify(raw_body: &[u8], signature_header: Option<&str>, app_secret: &str) -> bool {
    if app_secret.is_empty() {
        return false;
    }

    let Some(header) = signature_header else {
        return false;
    };
    let Some(signature_hex) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);

    // Constant-time comparison.
    mac.verify_slice(&expected).is_ok()
}

/// Compute the header value for a payload. Used by tests and local tooling.
pub fn sign(raw_body: &[u8], app_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(raw_body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}
