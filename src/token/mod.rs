//! Pass token wire format and signing routines.
//!
//! # Data Flow
//! ```text
//! edge request metadata
//!     → signer.rs (signing input, HMAC-SHA256, base64)
//!     → format.rs (render `signature.timestamp.nonce`)
//!     → x-cf-pass header on the forwarded request
//!
//! origin inbound header
//!     → format.rs (grammar check, parse fields)
//!     → signer.rs (recompute, constant-time compare)
//! ```
//!
//! # Design Decisions
//! - The grammar check is pure string inspection; no cryptographic work
//!   happens on a header that does not parse
//! - Both service roles use these routines; the wire contract lives in
//!   exactly one place

pub mod format;
pub mod signer;

pub use format::{PassToken, TokenParseError};

/// Name of the header carrying the pass token. Matched case-insensitively
/// on the verifying side.
pub const PASS_HEADER: &str = "x-cf-pass";
