//! Signing-input construction and HMAC-SHA256 helpers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Build the exact byte sequence both sides HMAC.
///
/// Field order and the pipe delimiter are part of the wire contract; any
/// divergence breaks verification. `user_agent` and `request_id` may be
/// empty strings.
pub fn signing_input(user_agent: &str, request_id: &str, timestamp: u64, nonce: &str) -> String {
    format!("{user_agent}|{request_id}|{timestamp}|{nonce}")
}

/// HMAC-SHA256 over `input`, standard-base64 encoded.
pub fn sign(secret: &[u8], input: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(input.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Check a provided base64 signature against `input` in constant time.
///
/// A signature that does not decode as base64 can never match and is
/// rejected outright.
pub fn verify(secret: &[u8], input: &str, provided: &str) -> bool {
    let Ok(provided) = BASE64.decode(provided) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(input.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2, base64-encoded.
        assert_eq!(
            sign(b"Jefe", "what do ya want for nothing?"),
            "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM="
        );
    }

    #[test]
    fn test_protocol_shaped_vector() {
        let input = signing_input("curl/8.5.0", "edge-req-1", 1700000000, "a3f19c2b");
        assert_eq!(input, "curl/8.5.0|edge-req-1|1700000000|a3f19c2b");
        assert_eq!(
            sign(b"shared-secret", &input),
            "LEtFo2zFCuXSKm15L8bEU3duX0D1yyT0YTCk60LOTyU="
        );
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let input = signing_input("", "", 1700000000, "00000000");
        let sig = sign(b"secret", &input);
        assert!(verify(b"secret", &input, &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let input = signing_input("ua", "rid", 1700000000, "a3f19c2b");
        let sig = sign(b"secret-a", &input);
        assert!(!verify(b"secret-b", &input, &sig));
    }

    #[test]
    fn test_verify_sensitive_to_every_field() {
        let sig = sign(b"secret", &signing_input("ua", "rid", 1700000000, "a3f19c2b"));
        assert!(!verify(b"secret", &signing_input("uax", "rid", 1700000000, "a3f19c2b"), &sig));
        assert!(!verify(b"secret", &signing_input("ua", "ridx", 1700000000, "a3f19c2b"), &sig));
        assert!(!verify(b"secret", &signing_input("ua", "rid", 1700000001, "a3f19c2b"), &sig));
        assert!(!verify(b"secret", &signing_input("ua", "rid", 1700000000, "a3f19c2c"), &sig));
    }

    #[test]
    fn test_verify_rejects_invalid_base64() {
        let input = signing_input("ua", "rid", 1700000000, "a3f19c2b");
        assert!(!verify(b"secret", &input, "not base64 at all!"));
        assert!(!verify(b"secret", &input, ""));
    }
}
