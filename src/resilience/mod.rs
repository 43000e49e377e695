//! Resilience helpers for upstream calls.
//!
//! # Data Flow
//! ```text
//! Call to market API:
//!     → retries.rs (classify error, retry transient ones)
//!     → backoff.rs (exponential delay + jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Only transient failures (timeouts, 5xx, rate limiting) are retried
//! - Jittered backoff prevents synchronized retries across instances

pub mod backoff;
pub mod retries;

pub use backoff::RetryPolicy;
pub use retries::retry;
