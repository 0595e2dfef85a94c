//! Parsing and rendering of the pass header value.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Length of the hex-encoded nonce (4 random bytes).
pub const NONCE_LEN: usize = 8;

/// Why a header value failed the grammar check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenParseError {
    #[error("expected exactly three dot-separated fields")]
    FieldCount,
    #[error("signature is empty or contains non-base64 characters")]
    BadSignature,
    #[error("timestamp is not a decimal integer")]
    BadTimestamp,
    #[error("nonce is not 8 lowercase hex characters")]
    BadNonce,
}

/// A parsed `x-cf-pass` header value.
///
/// Wire form is `signature.timestamp.nonce`:
/// - `signature`: base64 HMAC-SHA256 digest
/// - `timestamp`: decimal UNIX seconds at issuance
/// - `nonce`: 8 lowercase hex characters, unique per token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassToken {
    pub signature: String,
    pub timestamp: u64,
    pub nonce: String,
}

impl fmt::Display for PassToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.signature, self.timestamp, self.nonce)
    }
}

impl FromStr for PassToken {
    type Err = TokenParseError;

    /// Enforces the exact grammar `^[A-Za-z0-9/+=]+\.\d+\.[a-f0-9]{8}$`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (Some(signature), Some(timestamp), Some(nonce), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenParseError::FieldCount);
        };

        if signature.is_empty() || !signature.bytes().all(is_base64_char) {
            return Err(TokenParseError::BadSignature);
        }

        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenParseError::BadTimestamp);
        }
        let timestamp: u64 = timestamp.parse().map_err(|_| TokenParseError::BadTimestamp)?;

        if nonce.len() != NONCE_LEN || !nonce.bytes().all(is_lower_hex) {
            return Err(TokenParseError::BadNonce);
        }

        Ok(Self {
            signature: signature.to_string(),
            timestamp,
            nonce: nonce.to_string(),
        })
    }
}

fn is_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'/' || b == b'+' || b == b'='
}

fn is_lower_hex(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'a'..=b'f')
}
