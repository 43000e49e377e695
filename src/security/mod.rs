//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket, 429 when empty)
//!     → tower-http body limit, timeout and CORS (wired in http::server)
//!     → handlers
//! ```

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
