//! Caller identity for HTTP requests.
//!
//! Translates request headers into a [`SourceDescriptor`]. Credentials are
//! checked here; whether the claimed source may trigger a run is decided by
//! the scheduler's gate.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use postforge_scheduler::{SourceDescriptor, TriggerSource};

type HmacSha256 = Hmac<Sha256>;

/// Header naming the claimed trigger source.
pub const SOURCE_HEADER: &str = "x-trigger-source";
/// Header carrying `sha256=<hex>` over the raw request body.
pub const SIGNATURE_HEADER: &str = "x-signature-256";

/// Verifies operator tokens and webhook signatures.
#[derive(Debug, Clone, Default)]
pub struct IdentityVerifier {
    control_token: Option<String>,
    webhook_secret: Option<String>,
}

impl IdentityVerifier {
    pub fn new(control_token: Option<String>, webhook_secret: Option<String>) -> Self {
        Self {
            control_token: control_token.filter(|t| !t.is_empty()),
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }

    /// Build the descriptor for a request.
    ///
    /// The origin is always external. `authenticated` is set only when the
    /// credential matching the claimed kind verifies.
    pub fn describe(&self, headers: &HeaderMap, body: &[u8]) -> SourceDescriptor {
        let kind = headers
            .get(SOURCE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let authenticated = match kind.as_deref().and_then(|k| k.parse().ok()) {
            Some(TriggerSource::Interactive) => self.verify_bearer(headers),
            Some(TriggerSource::Webhook) => self.verify_signature(headers, body),
            _ => false,
        };

        SourceDescriptor::external(kind, authenticated)
    }

    /// Whether the request comes from an authenticated operator session.
    pub fn is_operator(&self, headers: &HeaderMap) -> bool {
        let descriptor = self.describe(headers, &[]);
        descriptor.authenticated
            && descriptor.kind.as_deref() == Some(TriggerSource::Interactive.as_str())
    }

    fn verify_bearer(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.control_token else {
            return false;
        };
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token_matches(token.trim().as_bytes(), expected.as_bytes()))
    }

    fn verify_signature(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        let Some(secret) = &self.webhook_secret else {
            return false;
        };
        headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("sha256="))
            .is_some_and(|signature| verify_hmac_sha256(secret.as_bytes(), body, signature))
    }
}

/// Hex HMAC-SHA256 of `payload`, as expected in the signature header.
pub fn compute_signature(secret: &[u8], payload: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_hmac_sha256(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Compares fixed-size digests so neither content nor length leaks through timing.
fn token_matches(presented: &[u8], expected: &[u8]) -> bool {
    let presented = <Sha256 as sha2::Digest>::digest(presented);
    let expected = <Sha256 as sha2::Digest>::digest(expected);
    presented.as_slice().ct_eq(expected.as_slice()).into()
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
