//! solbal CLI
//!
//! Runs the balance API server and offers one-shot lookups and key management.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use solbal_api::{ApiConfig, ApiServer, AppState};
use solbal_cache::{BalanceCache, BatchLookup, CacheConfig};
use solbal_core::constants::DEFAULT_LOOKUP_TIMEOUT_SECS;
use solbal_core::types::{BatchItem, LookupContext};
use solbal_keys::{generate_api_key, ApiKeyStore, FileKeyStore};
use solbal_rpc::{RpcConfig, SolanaRpcClient};

/// Lamports per SOL.
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// solbal - cached Solana wallet balances over HTTP
#[derive(Parser)]
#[command(name = "solbal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on (defaults to $PORT, then 8080)
        #[arg(short, long)]
        port: Option<u16>,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Look up balances once, without the server
    Lookup {
        /// Wallet addresses (base58)
        #[arg(required = true)]
        wallets: Vec<String>,
        /// Solana RPC URL
        #[arg(long, env = "SOLANA_RPC_URL")]
        rpc_url: String,
        /// Deadline for the whole batch in seconds
        #[arg(short, long, default_value_t = DEFAULT_LOOKUP_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Generate a new API key
    Keygen {
        /// Key file to add the key to
        #[arg(short, long, env = "API_KEYS_FILE")]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging
    let filter = default_log_filter(cli.verbose);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(cli.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Lookup {
            wallets,
            rpc_url,
            timeout,
        } => cmd_lookup(&wallets, rpc_url, timeout).await,
        Commands::Keygen { file } => cmd_keygen(file).await,
    }
}

/// Run the API server
/// Log filter used when `RUST_LOG` is unset. Request logs come from `tower_http`.
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "solbal=debug,tower_http=debug,info"
    } else {
        "solbal=info,tower_http=info,warn"
    }
}

async fn cmd_serve(port: Option<u16>, bind: &str) -> Result<()> {
    let mut config = ApiConfig::from_env().context("Invalid configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    let addr: SocketAddr = format!("{}:{}", bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {bind}"))?;

    println!("{}", "🚀 Starting solbal API server...".cyan().bold());
    println!("   {} {}", "RPC:".dimmed(), config.rpc_url);
    println!(
        "   {} {}s",
        "Cache TTL:".dimmed(),
        config.cache.ttl_seconds
    );
    println!("   {} http://{}", "Listening on:".green(), addr);
    println!("   {} http://{}/health", "Health check:".dimmed(), addr);
    println!("\n   Press Ctrl+C to stop.\n");

    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize server state")?;
    ApiServer::new(state).run(addr).await?;

    Ok(())
}

/// One-shot batch lookup
async fn cmd_lookup(wallets: &[String], rpc_url: String, timeout: u64) -> Result<()> {
    println!(
        "{} {} wallet(s)",
        "🔍 Looking up".cyan().bold(),
        wallets.len()
    );

    let client = SolanaRpcClient::with_config(RpcConfig::new(rpc_url))
        .context("Failed to create RPC client")?;
    let config = CacheConfig {
        sweep_interval_seconds: 0,
        ..CacheConfig::default()
    };
    let cache = Arc::new(BalanceCache::with_config(Arc::new(client), config));
    let batch = BatchLookup::new(cache);

    let start = std::time::Instant::now();
    let ctx = LookupContext::with_timeout(Duration::from_secs(timeout));
    let items = batch.resolve_all(&ctx, wallets).await;

    println!();
    for item in &items {
        print_item(item);
    }

    let failed = items.iter().filter(|i| !i.is_ok()).count();
    println!(
        "\n   {} {} ok, {} failed in {:?}",
        "Done:".dimmed(),
        items.len() - failed,
        failed,
        start.elapsed()
    );

    if failed == items.len() {
        anyhow::bail!("No balance could be fetched");
    }
    Ok(())
}

fn print_item(item: &BatchItem) {
    match &item.error {
        None => {
            let lamports = item.value.lamports();
            println!(
                "   {} {}  {} lamports ({:.9} SOL)",
                "✓".green(),
                item.key,
                lamports.to_string().bold(),
                lamports as f64 / LAMPORTS_PER_SOL
            );
        }
        Some(err) => {
            println!("   {} {}  {}", "✗".red(), item.key, err.to_string().red());
        }
    }
}

/// Generate an API key
async fn cmd_keygen(file: Option<PathBuf>) -> Result<()> {
    let key = generate_api_key();

    if let Some(path) = file {
        let store = FileKeyStore::open(&path)
            .await
            .with_context(|| format!("Failed to open key file {}", path.display()))?;
        store.insert(&key).await.context("Failed to store key")?;
        println!(
            "{} {} ({} keys)",
            "✅ Key added to".green().bold(),
            path.display(),
            store.count().await?
        );
    }

    println!("{}", key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_keeps_request_logs() {
        for verbose in [false, true] {
            let filter = default_log_filter(verbose);
            assert!(filter.contains("tower_http="));
            assert!(EnvFilter::try_new(filter).is_ok());
        }
    }
}
