//! CLI argument definitions for the Nexus identity vault.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nexus_vault::ProtectionTier;

/// nexus-vault -- tiered encrypted identity storage.
#[derive(Parser)]
#[command(
    name = "nexus-vault",
    version,
    about = "Nexus identity vault -- tiered encrypted identity storage",
    long_about = "Stores one opaque identity blob per protection tier, encrypted with \
                  AES-256-GCM. The biometric tier asks for confirmation on every use."
)]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory. Overrides the config file and NEXUS_VAULT_DIR.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt and store an identity blob read from FILE ("-" for stdin).
    Store {
        /// Protection tier: standard or biometric.
        #[arg(long, short, default_value = "standard")]
        tier: ProtectionTier,

        file: PathBuf,
    },

    /// Import an identity produced elsewhere. Same as `store`.
    Import {
        #[arg(long, short, default_value = "standard")]
        tier: ProtectionTier,

        file: PathBuf,
    },

    /// Decrypt a stored identity. Prints base64 unless --out is given.
    ///
    /// An empty tier is reported on stderr and is not an error.
    Retrieve {
        #[arg(long, short, default_value = "standard")]
        tier: ProtectionTier,

        /// Write the raw identity bytes to this file instead.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Read or replace the plaintext metadata document.
    Metadata {
        #[command(subcommand)]
        action: MetadataAction,
    },

    /// Delete the standard identity and destroy its key.
    Wipe {
        /// Wipe the biometric tier instead.
        #[arg(long)]
        biometric: bool,
    },

    /// Show which tiers hold an identity.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Actions for the metadata document.
#[derive(Subcommand)]
pub enum MetadataAction {
    /// Replace the metadata with a JSON document.
    Set {
        /// The JSON text.
        json: String,
    },
    /// Print the metadata document.
    Get,
}
