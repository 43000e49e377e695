//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape on observability.metrics_address
//! ```
//!
//! Request IDs are attached by the HTTP layer and appear in every request span.

pub mod logging;
pub mod metrics;
