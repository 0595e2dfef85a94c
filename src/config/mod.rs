//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared with the chosen service role at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the shared secret in particular is
//!   read-only process-wide state
//! - All fields have defaults so a minimal config only names the secret
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, PassConfig, ServiceConfig, TimeoutConfig, UpstreamConfig,
};
