//! RimToken wallet service library.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod storage;

// Domain
pub mod achievements;
pub mod auth;
pub mod blockchain;
pub mod ledger;
pub mod market;
pub mod portfolio;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::WalletConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
