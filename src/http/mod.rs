//! HTTP service subsystem.
//!
//! # Data Flow
//! ```text
//! client request
//!     → edge.rs (assign request id, mint + stamp x-cf-pass)
//!     → forward.rs (rewrite URI, send toward origin)
//!
//! origin inbound request
//!     → origin.rs middleware (extract → freshness → replay → signature)
//!     → allow: forward.rs (send to application upstream)
//!     → deny:  fixed 403, request handling ends
//! ```

pub mod edge;
pub mod forward;
pub mod origin;

pub use edge::EdgeServer;
pub use origin::OriginServer;
