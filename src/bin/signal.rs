use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use zkp_anonymous_signal::{
    config::Config,
    ethereum::{identity_from_private_key, wallet_address},
    membership::{commitments_root, prove_in_list, verify_against},
    storage::CommitmentLog,
    utils::{field_to_hex, parse_field_hex},
    Halo2ProofSystem, Identity, ProofSystem, SignalRequest, SignalWitness,
};

/// Builds an anonymous signal for a member of the group.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Identity seed, as written by `generate_identities`.
    #[arg(long, conflicts_with = "private_key", required_unless_present = "private_key")]
    seed: Option<String>,

    /// Ethereum private key; the identity is derived from its signature.
    #[arg(short, long)]
    private_key: Option<String>,

    #[arg(short, long)]
    message: String,

    /// Defaults to the configured external nullifier.
    #[arg(short, long)]
    external_nullifier: Option<String>,

    #[arg(long)]
    commitments: Option<PathBuf>,

    #[arg(short, long, default_value = "signal.toml")]
    config: PathBuf,

    #[arg(short, long, default_value = "signal.json")]
    output: PathBuf,
}

fn load_identity(args: &Args) -> Result<Identity> {
    match (&args.seed, &args.private_key) {
        (Some(seed), _) => Identity::new(seed.trim().as_bytes()).context("Invalid seed"),
        (None, Some(key)) => {
            println!("Wallet address: {}", wallet_address(key)?);
            identity_from_private_key(key).context("Failed to derive identity from wallet")
        }
        (None, None) => Err(anyhow::anyhow!("Either --seed or --private-key is required")),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load_from_file_or_default(&args.config).with_env_overrides();
    let commitments_file = args
        .commitments
        .clone()
        .unwrap_or_else(|| config.storage.commitments_file.clone());
    let external_nullifier = match &args.external_nullifier {
        Some(hex) => parse_field_hex(hex).context("Invalid external nullifier")?,
        None => config.verifier_settings()?.external_nullifier,
    };

    let identity = load_identity(&args)?;
    println!("Identity commitment: {}", field_to_hex(identity.commitment()));

    println!("Loading commitments from: {}", commitments_file.display());
    let commitments = CommitmentLog::open(&commitments_file)
        .and_then(|log| log.load())
        .with_context(|| format!("Failed to read {}", commitments_file.display()))?;
    if commitments.is_empty() {
        return Err(anyhow::anyhow!(
            "No commitments found in '{}'",
            commitments_file.display()
        ));
    }

    let depth = config.tree.depth;
    let root = commitments_root(depth, &commitments).context("Failed to build group")?;
    info!("Group of {} members, root {}", commitments.len(), field_to_hex(root));

    let merkle_proof = prove_in_list(depth, &commitments, identity.commitment())
        .with_context(|| {
            format!(
                "Identity not found in '{}'. Make sure it was registered.",
                commitments_file.display()
            )
        })?;
    if !verify_against(&merkle_proof, root) {
        return Err(anyhow::anyhow!("Membership proof does not match the group root"));
    }
    debug!("Leaf index: {}", merkle_proof.leaf_index());

    let witness = SignalWitness::build(&identity, &merkle_proof, external_nullifier, &args.message)
        .context("Failed to build witness")?;

    println!("Generating ZK-SNARK keys...");
    let backend = Halo2ProofSystem::setup(config.keys.circuit_k, depth)
        .context("Failed to generate proving keys")?;

    println!("Generating ZK proof (this may take a while)...");
    let proof = backend.prove(&witness).context("Failed to create proof")?;
    println!("ZK proof generated, size: {} bytes", proof.len());

    let public = witness.public_inputs();
    let request = SignalRequest::new(args.message.clone(), &public, proof);
    fs::write(&args.output, request.to_json()?)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Signal written to: {}", args.output.display());
    println!("Merkle Root: {}", field_to_hex(public.root));
    println!("Nullifier Hash: {}", field_to_hex(public.nullifier_hash));

    Ok(())
}
