//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=abc...,v1=def...`.
//! Each `v1` is a hex HMAC-SHA256 of `"{t}.{body}"` keyed with the endpoint
//! secret. More than one `v1` appears while a secret is being rolled.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::SignatureError;

/// Maximum age of a signed timestamp, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
#[must_use]
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a `Stripe-Signature` header against the raw request body.
///
/// # Errors
///
/// Returns `SignatureError` if the header is malformed, too old, or no
/// signature matches.
pub fn verify_signature(
    secret: &SecretString,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if now.abs_diff(timestamp) > TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let expected = compute_signature(secret.expose_secret(), timestamp, payload);
    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_4hG8kP2nQ9sV5xZ1";
    const NOW: i64 = 1_760_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn secret() -> SecretString {
        SecretString::from(SECRET.to_string())
    }

    fn header(timestamp: i64, body: &[u8]) -> String {
        format!("t={timestamp},v1={}", compute_signature(SECRET, timestamp, body))
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_valid_signature() {
        assert_eq!(
            verify_signature(&secret(), BODY, &header(NOW, BODY), NOW),
            Ok(())
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = compute_signature(SECRET, NOW, BODY);
        let header = format!("t={NOW},v1={},v1={good},v0=ignored", "0".repeat(64));
        assert_eq!(verify_signature(&secret(), BODY, &header, NOW), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = header(NOW, BODY);
        assert_eq!(
            verify_signature(&secret(), b"{\"id\":\"evt_2\"}", &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other = SecretString::from("whsec_other".to_string());
        assert_eq!(
            verify_signature(&other, BODY, &header(NOW, BODY), NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let signed_at = NOW - TOLERANCE_SECS - 1;
        assert_eq!(
            verify_signature(&secret(), BODY, &header(signed_at, BODY), NOW),
            Err(SignatureError::Stale)
        );
        let edge = NOW - TOLERANCE_SECS;
        assert_eq!(
            verify_signature(&secret(), BODY, &header(edge, BODY), NOW),
            Ok(())
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let zeros = "0".repeat(64);
        for signed_at in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={signed_at},v1={zeros}");
            assert_eq!(
                verify_signature(&secret(), BODY, &header, NOW),
                Err(SignatureError::Stale),
                "t={signed_at}"
            );
        }
    }

    #[test]
    fn test_malformed_headers() {
        for bad in ["", "v1=abc", "t=123", "t=abc,v1=def", "garbage"] {
            assert_eq!(
                verify_signature(&secret(), BODY, bad, NOW),
                Err(SignatureError::Malformed),
                "header {bad:?}"
            );
        }
    }
}
