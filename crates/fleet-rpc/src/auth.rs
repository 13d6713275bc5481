//! Shared-secret HMAC-SHA256 request signing and verification.
//!
//! Token shape: base64(`"<service_id>:<timestamp_ms>:<hex_signature>"`)
//! where `signature = HMAC-SHA256(secret, "<service_id>:<timestamp_ms>")`,
//! carried as `authorization: Bearer <token>`.

use base64::Engine;
use fleet_error::{ErrorCode, FleetError};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LEN: usize = 32;

/// Token lifetime used when a caller doesn't specify one.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(60);

/// A validated shared secret and its token lifetime.
///
/// The same config signs outgoing calls (as a client) and verifies
/// incoming ones (as a server); a service acting as both uses one config
/// for each direction.
#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
    lifetime: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl AuthConfig {
    /// Build a config with the default 60s lifetime.
    pub fn new(secret: impl Into<String>) -> Result<Self, FleetError> {
        Self::with_lifetime(secret, DEFAULT_LIFETIME)
    }

    /// Build a config with an explicit token lifetime.
    pub fn with_lifetime(secret: impl Into<String>, lifetime: Duration) -> Result<Self, FleetError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(FleetError::new(
                ErrorCode::MissingSecret,
                format!("shared secret must be at least {MIN_SECRET_LEN} bytes, got {}", secret.len()),
            ));
        }
        Ok(Self { secret, lifetime })
    }

    /// Sign a fresh bearer token for `service_id`.
    #[must_use]
    pub fn sign(&self, service_id: &str) -> String {
        encode_token(&self.secret, service_id, now_ms())
    }

    /// Verify a bearer token, returning the service id that signed it.
    pub fn verify(&self, token: &str) -> Result<String, FleetError> {
        verify_token(&self.secret, token, self.lifetime, now_ms())
    }
}

fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

fn encode_token(secret: &str, service_id: &str, timestamp_ms: u128) -> String {
    let payload = format!("{service_id}:{timestamp_ms}");
    let signature = hex::encode(sign_payload(secret, &payload));
    base64::engine::general_purpose::STANDARD.encode(format!("{payload}:{signature}"))
}

fn sign_payload(secret: &str, payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key accepts any length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn verify_token(secret: &str, token: &str, lifetime: Duration, now_ms: u128) -> Result<String, FleetError> {
    let unauthenticated = |msg: &str| FleetError::new(ErrorCode::Unauthenticated, msg.to_string());

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token)
        .map_err(|_| unauthenticated("malformed token encoding"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| unauthenticated("malformed token encoding"))?;

    let mut parts = decoded.splitn(3, ':');
    let service_id = parts.next().ok_or_else(|| unauthenticated("malformed token"))?;
    let timestamp_str = parts.next().ok_or_else(|| unauthenticated("malformed token"))?;
    let signature_hex = parts.next().ok_or_else(|| unauthenticated("malformed token"))?;

    let timestamp_ms: u128 = timestamp_str.parse().map_err(|_| unauthenticated("malformed token"))?;
    if now_ms.saturating_sub(timestamp_ms) > lifetime.as_millis() {
        return Err(unauthenticated("Token has expired"));
    }

    let expected = sign_payload(secret, &format!("{service_id}:{timestamp_ms}"));
    let actual = hex::decode(signature_hex).map_err(|_| unauthenticated("malformed token signature"))?;
    if !constant_time_eq(&expected, &actual) {
        return Err(unauthenticated("signature mismatch"));
    }

    Ok(service_id.to_string())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_is_rejected() {
        assert!(AuthConfig::new("too-short").is_err());
    }

    #[test]
    fn round_trips_within_lifetime() {
        let auth = AuthConfig::new("a".repeat(32)).unwrap();
        let token = auth.sign("svc-a");
        assert_eq!(auth.verify(&token).unwrap(), "svc-a");
    }

    #[test]
    fn any_byte_change_is_rejected() {
        let auth = AuthConfig::new("a".repeat(32)).unwrap();
        let mut token = auth.sign("svc-a");
        token.push('x');
        assert!(auth.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthConfig::with_lifetime("a".repeat(32), Duration::from_secs(1)).unwrap();
        let token = encode_token("a".repeat(32).as_str(), "svc-a", now_ms() - 2_000);
        let err = auth.verify(&token).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
        assert_eq!(err.message, "Token has expired");
    }
}
