use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use zkp_anonymous_signal::{
    config::Config, field_to_hex, EventLog, GroupStore, Halo2ProofSystem, NullifierLedger, SignalRequest,
    SignalVerifier,
};

/// Upper bound on the signal JSON file. Proof bytes are hex encoded, so twice
/// the proof limit plus room for the other fields.
fn max_signal_file_size(max_proof_size: usize) -> u64 {
    (max_proof_size as u64) * 2 + 4096
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    signal_file: PathBuf,

    #[arg(short, long, default_value = "signal.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_from_file_or_default(&args.config).with_env_overrides();
    debug!("Configuration: {config:?}");

    if !args.signal_file.exists() {
        return Err(anyhow::anyhow!(
            "Signal file does not exist: {}",
            args.signal_file.display()
        ));
    }

    let metadata = fs::metadata(&args.signal_file).context("Failed to read signal file metadata")?;
    let max_size = max_signal_file_size(config.verifier.max_proof_size);
    if metadata.len() > max_size {
        return Err(anyhow::anyhow!(
            "Signal file too large: {} bytes (max {} bytes). Set SIGNAL_MAX_PROOF_SIZE to raise the limit.",
            metadata.len(),
            max_size
        ));
    }

    info!("Loading signal from: {}", args.signal_file.display());
    let content = fs::read_to_string(&args.signal_file).context("Failed to read signal file")?;
    let request = SignalRequest::from_json(&content).context("Failed to parse signal JSON")?;

    let depth = config.tree.depth;
    let store = GroupStore::open(depth, config.root_window(), &config.storage.commitments_file)
        .context("Failed to load group commitments")?;
    let (root, members) = store.snapshot();
    info!("Group of {members} members, root {}", field_to_hex(root));
    let ledger = if config.storage.enable_persistence {
        NullifierLedger::open(&config.storage.nullifiers_file)
            .context("Failed to load consumed nullifiers")?
    } else {
        NullifierLedger::new()
    };

    info!("Generating ZK-SNARK keys");
    let backend = Halo2ProofSystem::setup(config.keys.circuit_k, depth)
        .context("Failed to generate verification keys")?;

    let verifier = SignalVerifier::new(
        Arc::new(store),
        Arc::new(ledger),
        Arc::new(EventLog::new()),
        backend,
        config.verifier_settings()?,
    );

    let response = verifier.handle(&request);
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to encode response")?
    );

    if response.accepted {
        info!("Signal accepted: {}", request.message);
        Ok(())
    } else {
        let reason = response.reason.unwrap_or_default();
        error!("Signal rejected: {reason}");
        Err(anyhow::anyhow!("Signal rejected: {reason}"))
    }
}
