//! Tiered identity vault for Nexus.
//!
//! This crate stores one opaque identity blob per protection tier, encrypted
//! at rest with AES-256-GCM under a key that never leaves its key store.
//! Alongside the identities it keeps a small plaintext JSON metadata
//! document.
//!
//! There are two tiers:
//!
//! - **standard**: the key can be used whenever the device is in hand.
//! - **biometric**: every use of the key needs a fresh proof of user
//!   presence, obtained through a host-supplied [`BiometricGate`].
//!
//! # Modules
//!
//! - [`keystore`]: the [`SecureKeyStore`] contract and presence proofs.
//! - [`software`]: a software key store with optional file persistence.
//! - [`key_provider`]: per-tier key provisioning.
//! - [`cipher`]: envelope format and the seal/open engine.
//! - [`gate`]: the biometric gate contract.
//! - [`blob`]: atomic named blob persistence.
//! - [`metadata`]: the plaintext metadata document.
//! - [`vault`]: the [`Vault`] orchestrator.
//! - [`surface`]: a boolean wrapper for hosts without typed errors.
//! - [`config`]: storage layout and data directory configuration.
//! - [`error`]: unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use nexus_vault::{ProtectionTier, SoftwareKeyStore, UnavailableGate, Vault, VaultConfig};
//!
//! # async fn example() -> nexus_vault::Result<()> {
//! let config = VaultConfig::default().with_env_overrides();
//! let keystore = Arc::new(SoftwareKeyStore::open(config.key_dir())?);
//! let vault = Vault::open(&config, keystore, Arc::new(UnavailableGate))?;
//!
//! vault.store(ProtectionTier::Standard, b"serialized identity").await?;
//! let identity = vault.retrieve(ProtectionTier::Standard).await?;
//! assert_eq!(identity.as_deref(), Some(&b"serialized identity"[..]));
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod cipher;
pub mod config;
pub mod error;
pub mod gate;
pub mod key_provider;
pub mod keystore;
pub mod metadata;
pub mod software;
pub mod surface;
pub mod tier;
pub mod vault;

pub use blob::{BlobStore, FileBlobStore};
pub use cipher::{AuthenticatedCipher, CipherEngine, Envelope, PreparedCipher};
pub use config::{StorageLayout, VaultConfig};
pub use error::{ErrorKind, Result, VaultError};
pub use gate::{BiometricGate, GateOutcome, GatePurpose, UnavailableGate};
pub use key_provider::{KeyHandle, KeyProvider};
pub use keystore::{PresenceAuthority, SecureKeyStore};
pub use software::SoftwareKeyStore;
pub use surface::SecureStorage;
pub use tier::ProtectionTier;
pub use vault::{TierState, TierStatus, Vault, VaultStatus};
