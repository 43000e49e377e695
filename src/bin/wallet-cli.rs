use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "wallet-cli")]
#[command(about = "Management CLI for the RimToken wallet service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check storage, market provider and chain status
    Health,
    /// List assets with current prices
    Market,
    /// Fetch fresh prices from the market provider
    Refresh,
    /// Show the portfolio summary of a user
    Portfolio { user_id: i32 },
    /// Check an address for a network (ethereum, bsc, polygon, solana)
    Validate { network: String, address: String },
    /// Generate a new key pair for a network
    NewWallet { network: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let (method, path) = match &cli.command {
        Commands::Health => (Method::GET, "/api/system/health".to_string()),
        Commands::Market => (Method::GET, "/api/market".to_string()),
        Commands::Refresh => (Method::POST, "/api/market/refresh".to_string()),
        Commands::Portfolio { user_id } => (Method::GET, format!("/api/portfolio/{}", user_id)),
        Commands::Validate { network, address } => {
            (Method::GET, format!("/api/chains/{}/validate/{}", network, address))
        }
        Commands::NewWallet { network } => (Method::POST, format!("/api/chains/{}/wallets", network)),
    };

    let res = client.request(method, format!("{}{}", base, path)).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: wallet API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
