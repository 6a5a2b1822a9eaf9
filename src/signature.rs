//! Slack request signature verification.
//!
//! Slack signs each webhook request with HMAC-SHA256 over
//! `v0:{timestamp}:{body}` and sends the result as `v0={hex}` in the
//! `x-slack-signature` header. Socket Mode events are authenticated at
//! the transport level and never pass through here.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed clock skew between the request timestamp and now.
/// Bounds the replay-attack window.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

/// Verifies webhook signatures against the shared signing secret.
pub struct SignatureVerifier {
    signing_secret: Option<SecretString>,
}

impl SignatureVerifier {
    pub fn new(signing_secret: Option<SecretString>) -> Self {
        Self { signing_secret }
    }

    /// Check `signature` against the digest recomputed from `timestamp`
    /// and the raw request body.
    ///
    /// Returns `false` (never errors) when the secret is absent, the MAC
    /// cannot be constructed, or the signature does not match.
    pub fn verify(&self, timestamp: &str, raw_body: &str, signature: &str) -> bool {
        let Some(secret) = &self.signing_secret else {
            warn!("SLACK_SIGNING_SECRET is not set; rejecting webhook event");
            return false;
        };

        let mut mac = match HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => {
                warn!("failed to construct HMAC for signature check");
                return false;
            }
        };
        mac.update(format!("v0:{timestamp}:{raw_body}").as_bytes());
        let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

        constant_time_eq(signature, &expected)
    }

    /// Check the request timestamp against `now`. Rejects stale (or
    /// unparseable) timestamps regardless of signature validity.
    pub fn is_fresh(&self, timestamp: &str, now: DateTime<Utc>) -> bool {
        let Ok(ts) = timestamp.trim().parse::<i64>() else {
            return false;
        };
        (now.timestamp() - ts).abs() <= MAX_TIMESTAMP_SKEW_SECS
    }
}

/// Constant-time string comparison. The length check short-circuits,
/// which leaks nothing about the secret.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn verifier(secret: &str) -> SignatureVerifier {
        SignatureVerifier::new(Some(SecretString::from(secret.to_string())))
    }

    /// Compute the canonical signature the way Slack does.
    fn sign(secret: &str, timestamp: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("v0:{timestamp}:{body}").as_bytes());
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_canonical_signature() {
        let v = verifier("my-secret");
        let sig = sign("my-secret", "1700000000", r#"{"type":"event_callback"}"#);
        assert!(v.verify("1700000000", r#"{"type":"event_callback"}"#, &sig));
    }

    #[test]
    fn rejects_mutated_body() {
        let v = verifier("my-secret");
        let sig = sign("my-secret", "1700000000", "body");
        assert!(!v.verify("1700000000", "bodY", &sig));
    }

    #[test]
    fn rejects_mutated_timestamp() {
        let v = verifier("my-secret");
        let sig = sign("my-secret", "1700000000", "body");
        assert!(!v.verify("1700000001", "body", &sig));
    }

    #[test]
    fn rejects_mutated_signature() {
        let v = verifier("my-secret");
        let mut sig = sign("my-secret", "1700000000", "body");
        // Flip the last hex digit.
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });
        assert!(!v.verify("1700000000", "body", &sig));
    }

    #[test]
    fn rejects_wrong_length_signature() {
        let v = verifier("my-secret");
        assert!(!v.verify("1700000000", "body", "v0=abc"));
    }

    #[test]
    fn rejects_when_secret_missing() {
        let v = SignatureVerifier::new(None);
        let sig = sign("my-secret", "1700000000", "body");
        assert!(!v.verify("1700000000", "body", &sig));
    }

    #[test]
    fn fresh_within_window() {
        let v = verifier("s");
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(v.is_fresh("1700000000", now));
        assert!(v.is_fresh("1699999701", now));
        assert!(v.is_fresh("1700000300", now));
    }

    #[test]
    fn stale_outside_window() {
        let v = verifier("s");
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(!v.is_fresh("1699999699", now));
        assert!(!v.is_fresh("1700000301", now));
    }

    #[test]
    fn unparseable_timestamp_is_stale() {
        let v = verifier("s");
        assert!(!v.is_fresh("not-a-number", Utc::now()));
        assert!(!v.is_fresh("", Utc::now()));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }
}
