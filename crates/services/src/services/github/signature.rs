//! Webhook payload authentication.
//!
//! GitHub signs every delivery with an HMAC-SHA256 over the raw request
//! body; the hex digest arrives as `sha256=<hex>` in the
//! `X-Hub-Signature-256` header. Comparison is constant-time.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify `header` against the HMAC-SHA256 of the raw, unparsed `body`.
pub fn verify_signature(
    body: &[u8],
    header: &str,
    secret: &SecretString,
) -> Result<(), SignatureError> {
    let digest_hex = header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::MalformedHeader)?;
    let provided = hex::decode(digest_hex).map_err(|_| SignatureError::MalformedHeader)?;

    let computed = compute(body, secret);
    if bool::from(computed.as_slice().ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produce a `sha256=<hex>` header value for `body`. Counterpart of
/// [`verify_signature`], used when replaying deliveries locally.
pub fn sign(body: &[u8], secret: &SecretString) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(compute(body, secret)))
}

fn compute(body: &[u8], secret: &SecretString) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}
