//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → storage → chains → market providers → AppState → background tasks
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → refresher and housekeeping exit → server drains → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - TLS shutdown has a grace period: connections still open after it are dropped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{assemble_state, build_state, spawn_background_tasks, StartupError};
