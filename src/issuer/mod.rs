//! Token issuance (edge side).
//!
//! # Responsibilities
//! - Bind the request's User-Agent and edge request id to the current time
//!   and a fresh random nonce
//! - Produce the signed header value stamped onto the forwarded request

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::token::format::NONCE_LEN;
use crate::token::{signer, PassToken};

/// Issues pass tokens for requests crossing the edge.
///
/// Issuance has no error path: HMAC-SHA256 accepts keys of any length and
/// the process CSPRNG aborts rather than returning weak bytes, so a request
/// is either stamped with a valid token or not forwarded at all.
pub struct Issuer {
    secret: Vec<u8>,
}

impl Issuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token binding `user_agent` and `request_id` to now.
    ///
    /// Both fields default to the empty string upstream when the inbound
    /// request did not carry them.
    pub fn issue(&self, user_agent: &str, request_id: &str) -> PassToken {
        let timestamp = unix_now();
        let nonce = generate_nonce();
        let input = signer::signing_input(user_agent, request_id, timestamp, &nonce);
        let signature = signer::sign(&self.secret, &input);

        PassToken {
            signature,
            timestamp,
            nonce,
        }
    }
}

/// 4 bytes from the process CSPRNG, hex-encoded lowercase and zero-padded
/// per byte.
fn generate_nonce() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    bytes.iter().fold(String::with_capacity(NONCE_LEN), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_issued_token_roundtrips_through_grammar() {
        let issuer = Issuer::new("shared-secret".as_bytes());
        let token = issuer.issue("curl/8.5.0", "edge-req-1");

        let reparsed = PassToken::from_str(&token.to_string()).unwrap();
        assert_eq!(reparsed, token);
        assert_eq!(token.nonce.len(), NONCE_LEN);
    }

    #[test]
    fn test_issued_signature_verifies() {
        let issuer = Issuer::new("shared-secret".as_bytes());
        let token = issuer.issue("curl/8.5.0", "edge-req-1");

        let input =
            signer::signing_input("curl/8.5.0", "edge-req-1", token.timestamp, &token.nonce);
        assert!(signer::verify(b"shared-secret", &input, &token.signature));
    }

    #[test]
    fn test_empty_metadata_is_signable() {
        let issuer = Issuer::new("shared-secret".as_bytes());
        let token = issuer.issue("", "");

        let input = signer::signing_input("", "", token.timestamp, &token.nonce);
        assert!(signer::verify(b"shared-secret", &input, &token.signature));
    }

    #[test]
    fn test_successive_nonces_differ() {
        let issuer = Issuer::new("shared-secret".as_bytes());
        let a = issuer.issue("ua", "rid");
        let b = issuer.issue("ua", "rid");
        // 32 bits of nonce; two draws colliding is a broken RNG, not luck.
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_timestamp_is_current() {
        let issuer = Issuer::new("shared-secret".as_bytes());
        let before = unix_now();
        let token = issuer.issue("ua", "rid");
        let after = unix_now();
        assert!(token.timestamp >= before && token.timestamp <= after);
    }
}
