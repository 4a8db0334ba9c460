use alloy::primitives::B256;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use raptor_chain::TxFetcher;
use raptor_core::config::AppConfig;
use raptor_core::utils::parse_address;
use raptor_dex::{decode_swap_calldata, Classifier};
use raptor_engine::Engine;
use std::str::FromStr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "raptor", version, about = "Opportunistic on-chain execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the execution engine.
    Run {
        #[arg(short, long, default_value = "config/raptor.toml")]
        config: String,
    },
    /// Fetch a pending transaction and print its classification.
    Classify {
        #[arg(short, long, default_value = "config/raptor.toml")]
        config: String,
        #[arg(long)]
        tx: String,
    },
    /// Classify a recorded file of pending transactions offline.
    Replay {
        #[arg(short, long, default_value = "config/raptor.toml")]
        config: String,
        #[arg(short, long, default_value = "samples/pending_txs.json")]
        file: String,
    },
    /// Print the effective configuration after env overrides.
    PrintConfig {
        #[arg(short, long, default_value = "config/raptor.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let mut engine = Engine::new(cfg).await?;
            engine.run().await?;
        }
        Commands::Classify { config, tx } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let classifier = classifier_from_config(&cfg)?;
            let client = raptor_chain::NodeClient::connect(&cfg.chain).await?;
            let fetcher = TxFetcher::new(client.http, cfg.mempool.tx_fetch_timeout_ms);
            let hash = B256::from_str(tx.trim_start_matches("0x"))
                .map_err(|_| anyhow!("invalid tx hash"))?;
            match fetcher.fetch(hash).await? {
                Some(tx) => {
                    let classification = classifier.classify(&tx.input, tx.to);
                    println!(
                        "{} is_swap={} exchange={}",
                        classification.name,
                        classification.is_swap,
                        classification.exchange.as_deref().unwrap_or("-")
                    );
                    if let Some(swap) = decode_swap_calldata(&tx.input)? {
                        println!("decoded: {swap:?}");
                    }
                }
                None => println!("transaction not found"),
            }
        }
        Commands::Replay { config, file } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let classifier = classifier_from_config(&cfg)?;
            let data = std::fs::read_to_string(file)?;
            let entries: Vec<ReplayEntry> = serde_json::from_str(&data)?;
            for entry in entries {
                let input = hex::decode(entry.input.trim_start_matches("0x"))?;
                let to = entry
                    .to
                    .as_deref()
                    .map(parse_address)
                    .transpose()?;
                let classification = classifier.classify(&input, to);
                if classification.is_swap {
                    println!(
                        "{} -> {} on {}",
                        entry.hash,
                        classification.name,
                        classification.exchange.as_deref().unwrap_or("?")
                    );
                } else {
                    warn!("no swap in {}", entry.hash);
                }
            }
        }
        Commands::PrintConfig { config } => {
            let cfg = AppConfig::load(&config)?;
            init_tracing(&cfg.observability.log_level);
            let json = serde_json::to_string_pretty(&cfg)?;
            println!("{json}");
        }
    }

    info!("done");
    Ok(())
}

fn classifier_from_config(cfg: &AppConfig) -> Result<Classifier> {
    let venues = cfg
        .dex
        .venues
        .iter()
        .map(|venue| Ok((parse_address(&venue.router)?, venue.name.clone())))
        .collect::<Result<Vec<_>>>()?;
    Ok(Classifier::new(venues))
}

fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) => EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        Err(_) => EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(serde::Deserialize)]
struct ReplayEntry {
    hash: String,
    #[serde(default)]
    to: Option<String>,
    input: String,
}
