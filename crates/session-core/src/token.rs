//! Viewer Token Service (spec.md §4.2).
//!
//! Binds a viewer websocket to exactly one session with an expiry. Payload
//! is base64url(`session_id:exp`) + an HMAC-SHA256 signature, compared in
//! constant time — the same shape as the teacher's node-token check in
//! `nodes::ws::token_eq`, applied here to a signed payload instead of a
//! pre-shared secret.

use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct ViewerTokenService {
    secret: String,
}

impl ViewerTokenService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for `session_id` valid for `ttl_secs` seconds.
    pub fn mint(&self, session_id: &str, ttl_secs: u64) -> String {
        let exp = Utc::now().timestamp() + ttl_secs as i64;
        let payload = format!("{session_id}:{exp}");
        let sig = self.sign(&payload);
        let encoded_payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&payload);
        let encoded_sig = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(sig);
        format!("{encoded_payload}.{encoded_sig}")
    }

    /// Verify that `token` is a valid, unexpired token for `session_id`.
    /// Any parse failure, signature mismatch, or expiry collapses to
    /// `false` — no distinction is surfaced to callers (spec.md §4.2).
    pub fn verify(&self, session_id: &str, token: &str) -> bool {
        let Some((encoded_payload, encoded_sig)) = token.split_once('.') else {
            return false;
        };
        let Ok(payload_bytes) =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded_payload)
        else {
            return false;
        };
        let Ok(sig_bytes) = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded_sig)
        else {
            return false;
        };
        let Ok(payload) = String::from_utf8(payload_bytes) else {
            return false;
        };
        let Some((token_session_id, exp_str)) = payload.rsplit_once(':') else {
            return false;
        };
        if token_session_id != session_id {
            return false;
        }
        let Ok(exp) = exp_str.parse::<i64>() else {
            return false;
        };
        if Utc::now().timestamp() > exp {
            return false;
        }

        let expected_sig = self.sign(&payload);
        expected_sig.ct_eq(&sig_bytes).into()
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_verifies() {
        let svc = ViewerTokenService::new("secret-123");
        let token = svc.mint("session-a", 60);
        assert!(svc.verify("session-a", &token));
    }

    #[test]
    fn wrong_session_fails() {
        let svc = ViewerTokenService::new("secret-123");
        let token = svc.mint("session-a", 60);
        assert!(!svc.verify("session-b", &token));
    }

    #[test]
    fn mutated_byte_fails() {
        let svc = ViewerTokenService::new("secret-123");
        let mut token = svc.mint("session-a", 60);
        token.push('x');
        assert!(!svc.verify("session-a", &token));
    }

    #[test]
    fn expired_token_fails() {
        let svc = ViewerTokenService::new("secret-123");
        let token = svc.mint("session-a", 0);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(!svc.verify("session-a", &token));
    }

    #[test]
    fn garbage_token_fails() {
        let svc = ViewerTokenService::new("secret-123");
        assert!(!svc.verify("session-a", "not-a-token"));
        assert!(!svc.verify("session-a", ""));
    }
}
