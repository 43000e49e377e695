//! HTTP API.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (router, middleware stack)
//!     → handlers/* (extract, call into storage / ledger / market / chains)
//!     → error.rs (subsystem errors → status + JSON message)
//! ```

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer, X_REQUEST_ID};

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;
