use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use zkp_anonymous_signal::{storage::CommitmentLog, utils::field_to_hex, Identity};

/// Generates test identities: a seeds file for signalers and the matching
/// commitment log for the verifier.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 100)]
    count: usize,

    #[arg(long, default_value = "commitments.txt")]
    commitments: PathBuf,

    #[arg(long, default_value = "seeds.txt")]
    seeds: PathBuf,
}

fn random_seed() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("Generating {} identities...", args.count);
    let seeds: Vec<String> = (0..args.count).map(|_| random_seed()).collect();
    let identities = seeds
        .iter()
        .map(|seed| Identity::new(seed.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to derive identity")?;

    let unique: HashSet<_> = identities.iter().map(|id| field_to_hex(id.commitment())).collect();
    if unique.len() != identities.len() {
        return Err(anyhow::anyhow!("Generated duplicate commitments"));
    }

    let log = CommitmentLog::open(&args.commitments)
        .with_context(|| format!("Failed to open {}", args.commitments.display()))?;
    for identity in &identities {
        log.append(identity.commitment())
            .context("Failed to append commitment")?;
    }

    let mut file = File::create(&args.seeds)
        .with_context(|| format!("Failed to create {}", args.seeds.display()))?;
    for seed in &seeds {
        writeln!(file, "{seed}").context("Failed to write seed")?;
    }

    println!(
        "Appended {} commitments to {}",
        identities.len(),
        args.commitments.display()
    );
    println!("Wrote seeds to {}", args.seeds.display());
    println!("First 5 commitments:");
    for (i, identity) in identities.iter().take(5).enumerate() {
        println!("  {}: {}", i + 1, field_to_hex(identity.commitment()));
    }

    Ok(())
}
