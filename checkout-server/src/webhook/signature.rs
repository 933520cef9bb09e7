//! Webhook payload signing
//!
//! The provider signs the raw request body with HMAC-SHA256 over a
//! shared secret and sends the hex digest in `X-Webhook-Signature`.
//! Verification is constant-time.

use ring::hmac;

/// Hex HMAC-SHA256 digest of `payload`, as the provider computes it
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hex::encode(hmac::sign(&key, payload).as_ref())
}

/// Verify a hex signature against the raw request body
pub fn verify_signature(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, payload, &signature).is_ok()
}
