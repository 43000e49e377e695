//! RimToken wallet service.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────────┐
//!                         │                  RIMTOKEN WALLET                      │
//!                         │                                                       │
//!   Client Request        │  ┌──────────┐   ┌───────────┐   ┌─────────────────┐   │
//!   ──────────────────────┼─▶│ security │──▶│   http    │──▶│    handlers     │   │
//!                         │  │rate limit│   │  server   │   │                 │   │
//!                         │  └──────────┘   └───────────┘   └────────┬────────┘   │
//!                         │                                          │            │
//!                         │          ┌───────────────┬───────────────┼──────────┐ │
//!                         │          ▼               ▼               ▼          ▼ │
//!                         │   ┌────────────┐  ┌────────────┐  ┌──────────┐ ┌─────┐│
//!                         │   │ledger/port-│  │   market   │  │blockchain│ │auth ││
//!                         │   │folio/achv. │  │ providers  │  │ registry │ │     ││
//!                         │   └─────┬──────┘  └─────┬──────┘  └────┬─────┘ └─────┘│
//!                         │         ▼               │              │              │
//!                         │   ┌────────────┐        │              │              │
//!                         │   │  storage   │        │              │              │
//!                         │   │ mem / pg   │        │              │              │
//!                         │   └────────────┘        │              │              │
//!                         └─────────────────────────┼──────────────┼──────────────┘
//!                                                   ▼              ▼
//!                                     CoinMarketCap / CoinGecko   EVM + Solana RPC
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use rimtoken_wallet::config::loader::load_config;
use rimtoken_wallet::http::HttpServer;
use rimtoken_wallet::lifecycle::{self, signals, Shutdown};
use rimtoken_wallet::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "rimtoken-wallet")]
#[command(about = "Multi-chain crypto wallet API server", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/wallet.toml")]
    config: PathBuf,

    /// Fail when the configuration file does not exist.
    #[arg(long)]
    require_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config, args.require_config)?;
    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rimtoken-wallet starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage = ?config.storage.backend,
        market = ?config.market.provider,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = lifecycle::build_state(config).await?;
    let config = state.config.clone();

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    let tasks = lifecycle::spawn_background_tasks(&state, &shutdown);

    let server = HttpServer::new(state);
    if config.listener.tls.is_some() {
        let addr = config.listener.bind_address.parse()?;
        server.run_tls(addr, shutdown.wait()).await?;
    } else {
        let listener = TcpListener::bind(&config.listener.bind_address).await?;
        server.run(listener, shutdown.wait()).await?;
    }

    // server may also stop on its own error path
    shutdown.trigger();
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
