//! Process lifecycle subsystem.
//!
//! # Responsibilities
//! - Coordinate graceful shutdown across the server and background tasks
//!
//! Signal handling (Ctrl+C) is wired in `main`, which triggers the
//! coordinator; everything else only subscribes.

pub mod shutdown;

pub use shutdown::Shutdown;
