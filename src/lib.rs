//! Origin-hiding pass token services library.

pub mod config;
pub mod http;
pub mod issuer;
pub mod lifecycle;
pub mod noncestore;
pub mod observability;
pub mod token;
pub mod verifier;

pub use config::ServiceConfig;
pub use http::{EdgeServer, OriginServer};
pub use lifecycle::Shutdown;
