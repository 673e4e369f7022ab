//! # Lattice: Pre-signed Bitcoin Contract Explorer
//!
//! Command-line explorer over the contract graph engine. A contract payload
//! (the JSON handed over by a contract compiler or data source) is loaded
//! into a [`ContractModel`] and inspected from there.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Summarize the transaction graph of a contract
//! lattice inspect contract.json
//!
//! # Which transactions can never be valid by block 820000?
//! lattice reachable contract.json --max-height 820000
//!
//! # Poll a Bitcoin node for confirmations and broadcastability
//! lattice watch contract.json --interval 30
//! ```

use anyhow::{Context, Result};
use bitcoin::Txid;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lattice::config::network;
use lattice::services::NodeClient;
use lattice::utils::{amount, txid};
use lattice::{ContractData, ContractModel};

#[derive(Parser)]
#[command(name = "lattice")]
#[command(about = "Explore the transaction graph of a pre-signed Bitcoin contract")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the transaction graph of a contract payload
    Inspect {
        /// Path to the contract payload JSON
        file: PathBuf,
    },
    /// List the transactions that cannot become valid by a horizon
    Reachable {
        /// Path to the contract payload JSON
        file: PathBuf,
        /// Time horizon: UNIX timestamp or RFC 3339 datetime (default: none)
        #[arg(long)]
        max_time: Option<String>,
        /// Height horizon in blocks (default: none)
        #[arg(long)]
        max_height: Option<u64>,
        /// Elapsed time to start from: UNIX timestamp or RFC 3339 datetime
        #[arg(long)]
        start_time: Option<String>,
        /// Elapsed height to start from
        #[arg(long, default_value_t = 0)]
        start_height: u64,
    },
    /// Poll a Bitcoin node for confirmations and report broadcastability
    Watch {
        /// Path to the contract payload JSON
        file: PathBuf,
        /// Poll interval in seconds
        #[arg(short, long, default_value_t = network::DEFAULT_POLL_SECS)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file } => inspect(&file),
        Commands::Reachable {
            file,
            max_time,
            max_height,
            start_time,
            start_height,
        } => reachable(&file, max_time, max_height, start_time, start_height),
        Commands::Watch { file, interval } => watch(&file, interval).await,
    }
}

fn load_contract(path: &Path) -> Result<ContractModel> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading contract payload {}", path.display()))?;
    let data = ContractData::from_json(&raw).context("parsing contract payload")?;
    ContractModel::from_data(&data).context("building contract graph")
}

/// Accept either a raw UNIX timestamp or an RFC 3339 datetime
fn parse_moment(raw: &str) -> Result<u64> {
    if let Ok(unix) = raw.parse::<u64>() {
        return Ok(unix);
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("{raw:?} is neither a UNIX timestamp nor RFC 3339"))?;
    u64::try_from(parsed.timestamp()).context("datetime is before the UNIX epoch")
}

fn inspect(file: &Path) -> Result<()> {
    let model = load_contract(file)?;

    let placeholders = model
        .transactions()
        .iter()
        .filter(|n| n.is_placeholder())
        .count();
    println!(
        "{} transactions ({} placeholders), {} outputs",
        model.transactions().len(),
        placeholders,
        model.outputs().count()
    );

    for node in model.transactions() {
        let marker = if node.is_placeholder() {
            " [external funding]"
        } else {
            ""
        };
        println!(
            "{}{} ({} variants)",
            node.txid(),
            marker,
            node.variants().len()
        );
        for input in &node.tx().input {
            println!(
                "  in  {}:{}",
                txid::format_short(&input.previous_output.txid.to_string()),
                input.previous_output.vout
            );
        }
        for &utxo_id in node.outputs() {
            let utxo = model.utxo(utxo_id);
            let spent = if utxo.is_unspent() {
                "unspent".to_string()
            } else {
                format!("{} spender(s)", utxo.spenders().len())
            };
            println!(
                "  out {}: {} ({})",
                utxo.vout(),
                amount::format_sats(utxo.value().to_sat()),
                spent
            );
        }
    }
    Ok(())
}

fn reachable(
    file: &Path,
    max_time: Option<String>,
    max_height: Option<u64>,
    start_time: Option<String>,
    start_height: u64,
) -> Result<()> {
    let model = load_contract(file)?;
    let max_time = max_time.as_deref().map(parse_moment).transpose()?;
    let start_time = start_time.as_deref().map(parse_moment).transpose()?;

    let unreachable = model.unreachable_within(
        max_time.unwrap_or(u64::MAX),
        max_height.unwrap_or(u64::MAX),
        start_time.unwrap_or(0),
        start_height,
    );

    if unreachable.is_empty() {
        println!(
            "all {} transactions remain reachable within the horizon",
            model.transactions().len()
        );
        return Ok(());
    }

    println!(
        "{} of {} transactions cannot become valid within the horizon:",
        unreachable.len(),
        model.transactions().len()
    );
    for id in unreachable {
        println!("  {}", model.node(id).txid());
    }
    Ok(())
}

async fn watch(file: &Path, interval: u64) -> Result<()> {
    let model = load_contract(file)?;
    let client = NodeClient::new().context("connecting to the Bitcoin node")?;
    let period = interval.clamp(network::MIN_POLL_SECS, network::MAX_POLL_SECS);
    log::info!("polling every {period}s via wallet {}", client.wallet_name());

    let mut confirmed: HashSet<Txid> = HashSet::new();
    loop {
        let candidates: Vec<Txid> = model
            .broadcastable(&confirmed)
            .into_iter()
            .map(|id| model.node(id).txid())
            .collect();
        match client.confirmed_transactions(&candidates) {
            Ok(newly_confirmed) => {
                for txid_hit in newly_confirmed {
                    if confirmed.insert(txid_hit) {
                        println!("confirmed: {txid_hit}");
                    }
                }
            }
            Err(e) => log::warn!("confirmation poll failed: {e}"),
        }

        let broadcastable = model.broadcastable(&confirmed);
        let height = client
            .get_block_count()
            .map(|h| h.to_string())
            .unwrap_or_else(|_| "?".to_string());
        println!(
            "height {height}: {} confirmed, {} broadcastable",
            confirmed.len(),
            broadcastable.len()
        );
        for id in broadcastable {
            println!("  ready: {}", txid::format_short(&model.node(id).txid().to_string()));
        }

        tokio::time::sleep(Duration::from_secs(period)).await;
    }
}
