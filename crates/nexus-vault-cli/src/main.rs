//! CLI entry point for the Nexus identity vault.
//!
//! This binary provides the `nexus-vault` command for storing, retrieving and
//! wiping identities and for managing the metadata document.

mod cli;
mod console_gate;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use base64::Engine;
use clap::Parser;
use nexus_vault::{ProtectionTier, SoftwareKeyStore, TierState, Vault, VaultConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, MetadataAction};
use crate::console_gate::ConsoleGate;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    let config = load_config(cli.config.as_deref(), cli.data_dir)?;
    let vault = open_vault(&config)?;

    match cli.command {
        Commands::Store { tier, file } => cmd_store(&vault, tier, &file, false).await,
        Commands::Import { tier, file } => cmd_store(&vault, tier, &file, true).await,
        Commands::Retrieve { tier, out } => cmd_retrieve(&vault, tier, out.as_deref()).await,
        Commands::Metadata { action } => cmd_metadata(&vault, action),
        Commands::Wipe { biometric } => cmd_wipe(&vault, biometric),
        Commands::Status { json } => cmd_status(&vault, &config, json),
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<VaultConfig> {
    let config = match path {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => VaultConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn open_vault(config: &VaultConfig) -> Result<Vault> {
    let keystore = Arc::new(
        SoftwareKeyStore::open(config.key_dir()).context("failed to open key store")?,
    );
    let gate = Arc::new(ConsoleGate::new(keystore.presence_authority()));
    tracing::debug!(key_dir = %config.key_dir().display(), "key store ready");
    Vault::open(config, keystore, gate).context("failed to open vault")
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_store(vault: &Vault, tier: ProtectionTier, file: &Path, import: bool) -> Result<()> {
    let from_stdin = file == Path::new("-");
    if from_stdin && tier == ProtectionTier::Biometric {
        // The confirmation prompt needs stdin.
        bail!("biometric tier cannot read the identity from stdin; pass a file path");
    }

    let blob = if from_stdin {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read identity from stdin")?;
        buf
    } else {
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?
    };

    let result = match (tier, import) {
        (ProtectionTier::Standard, false) => vault.store_standard(&blob),
        (ProtectionTier::Standard, true) => vault.import_identity(&blob),
        (ProtectionTier::Biometric, false) => vault.store_biometric(&blob).await,
        (ProtectionTier::Biometric, true) => vault.import_identity_biometric(&blob).await,
    };
    result.with_context(|| format!("failed to store {tier} identity"))?;

    println!("  Stored {} bytes in the {tier} tier.", blob.len());
    Ok(())
}

async fn cmd_retrieve(vault: &Vault, tier: ProtectionTier, out: Option<&Path>) -> Result<()> {
    let Some(blob) = vault
        .retrieve(tier)
        .await
        .with_context(|| format!("failed to retrieve {tier} identity"))?
    else {
        eprintln!("  No identity stored in the {tier} tier.");
        return Ok(());
    };

    match out {
        Some(path) => {
            std::fs::write(path, &blob)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("  Wrote {} bytes to {}", blob.len(), path.display());
        }
        None => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&blob);
            writeln!(io::stdout(), "{encoded}")?;
        }
    }
    Ok(())
}

fn cmd_metadata(vault: &Vault, action: MetadataAction) -> Result<()> {
    match action {
        MetadataAction::Set { json } => {
            vault
                .store_metadata(&json)
                .context("failed to store metadata")?;
            println!("  Metadata updated.");
        }
        MetadataAction::Get => match vault.get_metadata().context("failed to read metadata")? {
            Some(json) => println!("{json}"),
            None => eprintln!("  No metadata stored."),
        },
    }
    Ok(())
}

fn cmd_wipe(vault: &Vault, biometric: bool) -> Result<()> {
    if biometric {
        vault.wipe_biometric().context("failed to wipe biometric tier")?;
        println!("  Biometric identity and key destroyed.");
    } else {
        vault.wipe().context("failed to wipe standard tier")?;
        println!("  Standard identity and key destroyed.");
    }
    Ok(())
}

fn cmd_status(vault: &Vault, config: &VaultConfig, json: bool) -> Result<()> {
    let status = vault.status().context("failed to read vault status")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  Nexus Vault Status");
    println!("  ==================");
    println!();
    println!("  Data directory:   {}", config.data_dir.display());
    for tier in [&status.standard, &status.biometric] {
        let state = match tier.state {
            TierState::Stored => "stored",
            TierState::Empty => "empty",
        };
        let key = if tier.has_key { "present" } else { "absent" };
        println!("  {:<10} identity {state:<7} key {key}", tier.tier.as_str());
    }
    let metadata = if status.has_metadata { "present" } else { "absent" };
    println!("  Metadata:         {metadata}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}
