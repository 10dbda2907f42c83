//! Tiered identity vault.
//!
//! [`Vault`] ties the pieces together for each tier:
//!
//! ```text
//! store:    KeyProvider ─► (BiometricGate) ─► CipherEngine::seal ─► BlobStore::write
//! retrieve: BlobStore::read ─► KeyProvider ─► (BiometricGate) ─► CipherEngine::open
//! ```
//!
//! Per tier the state is either [`TierState::Empty`] or [`TierState::Stored`].
//! Storing overwrites; [`Vault::wipe`] takes the standard tier back to empty.
//! Every step that can fail runs before the blob write, and the write itself
//! is atomic, so a failed store leaves the previous record in place.
//!
//! `wipe` only touches the standard tier: its envelope file and its key. The
//! biometric tier and the metadata document survive it. Use
//! [`Vault::wipe_biometric`] to clear the biometric tier explicitly.

use std::sync::Arc;

use serde::Serialize;

use crate::blob::{BlobStore, FileBlobStore};
use crate::cipher::{CipherEngine, Envelope};
use crate::config::{StorageLayout, VaultConfig};
use crate::error::{Result, VaultError};
use crate::gate::{BiometricGate, GatePurpose};
use crate::key_provider::KeyProvider;
use crate::keystore::SecureKeyStore;
use crate::metadata::MetadataStore;
use crate::tier::ProtectionTier;

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

/// Whether a tier currently holds an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierState {
    Empty,
    Stored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierStatus {
    pub tier: ProtectionTier,
    pub state: TierState,
    pub has_key: bool,
}

/// Snapshot of what the vault holds. Computing it never decrypts anything
/// and never prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStatus {
    pub standard: TierStatus,
    pub biometric: TierStatus,
    pub has_metadata: bool,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

pub struct Vault {
    keys: KeyProvider,
    engine: CipherEngine,
    blobs: Arc<dyn BlobStore>,
    gate: Arc<dyn BiometricGate>,
    metadata: MetadataStore,
    layout: StorageLayout,
}

impl Vault {
    /// Assemble a vault from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArgument`] if `layout` has colliding or
    /// path-like names.
    pub fn new(
        keystore: Arc<dyn SecureKeyStore>,
        blobs: Arc<dyn BlobStore>,
        gate: Arc<dyn BiometricGate>,
        layout: StorageLayout,
    ) -> Result<Self> {
        layout.validate()?;
        Ok(Self {
            keys: KeyProvider::new(keystore.clone(), &layout),
            engine: CipherEngine::new(keystore),
            metadata: MetadataStore::new(blobs.clone(), layout.metadata.clone()),
            blobs,
            gate,
            layout,
        })
    }

    /// Open a vault whose blobs live in `config.data_dir`.
    pub fn open(
        config: &VaultConfig,
        keystore: Arc<dyn SecureKeyStore>,
        gate: Arc<dyn BiometricGate>,
    ) -> Result<Self> {
        let blobs = Arc::new(FileBlobStore::open(&config.data_dir)?);
        tracing::info!(dir = %config.data_dir.display(), "opening identity vault");
        Self::new(keystore, blobs, gate, config.layout.clone())
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn key_provider(&self) -> &KeyProvider {
        &self.keys
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    // -- Store ----------------------------------------------------------------

    /// Seal `blob` under the standard key and persist it.
    pub fn store_standard(&self, blob: &[u8]) -> Result<()> {
        let handle = self.keys.get_or_create_key(ProtectionTier::Standard)?;
        let envelope = self.engine.seal(&handle, blob)?;
        self.persist(ProtectionTier::Standard, &envelope)
    }

    /// Seal `blob` under the biometric key after one presence check.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AuthenticationDenied`] if the user declines;
    /// nothing is written in that case.
    pub async fn store_biometric(&self, blob: &[u8]) -> Result<()> {
        let handle = self.keys.get_or_create_key(ProtectionTier::Biometric)?;
        let prepared = self.engine.prepare_seal(&handle)?;

        let authenticated = self
            .gate
            .authenticate(GatePurpose::Encrypt, prepared)
            .await
            .into_result()
            .inspect_err(|e| log_gate_failure(ProtectionTier::Biometric, e))?;

        let envelope = self.engine.seal_authenticated(authenticated, blob)?;
        self.persist(ProtectionTier::Biometric, &envelope)
    }

    pub async fn store(&self, tier: ProtectionTier, blob: &[u8]) -> Result<()> {
        match tier {
            ProtectionTier::Standard => self.store_standard(blob),
            ProtectionTier::Biometric => self.store_biometric(blob).await,
        }
    }

    /// Import an identity produced elsewhere. Same semantics as
    /// [`store_standard`](Self::store_standard).
    pub fn import_identity(&self, blob: &[u8]) -> Result<()> {
        tracing::debug!(len = blob.len(), "importing identity");
        self.store_standard(blob)
    }

    /// Import an identity into the biometric tier. Same semantics as
    /// [`store_biometric`](Self::store_biometric).
    pub async fn import_identity_biometric(&self, blob: &[u8]) -> Result<()> {
        tracing::debug!(len = blob.len(), "importing identity (biometric)");
        self.store_biometric(blob).await
    }

    fn persist(&self, tier: ProtectionTier, envelope: &Envelope) -> Result<()> {
        self.blobs
            .write(self.layout.envelope_name(tier), envelope.as_bytes())?;
        tracing::info!(%tier, len = envelope.as_bytes().len(), "stored identity envelope");
        Ok(())
    }

    // -- Retrieve -------------------------------------------------------------

    /// Decrypt the standard-tier identity. `Ok(None)` if nothing is stored.
    pub fn retrieve_standard(&self) -> Result<Option<Vec<u8>>> {
        let Some(envelope) = self.load_envelope(ProtectionTier::Standard)? else {
            return Ok(None);
        };
        let handle = self.keys.get_or_create_key(ProtectionTier::Standard)?;
        let plaintext = self
            .engine
            .open(&handle, &envelope)
            .inspect_err(|e| log_open_failure(ProtectionTier::Standard, e))?;
        Ok(Some(plaintext))
    }

    /// Decrypt the biometric-tier identity after one presence check.
    ///
    /// Returns `Ok(None)` without prompting if nothing is stored.
    pub async fn retrieve_biometric(&self) -> Result<Option<Vec<u8>>> {
        let Some(envelope) = self.load_envelope(ProtectionTier::Biometric)? else {
            tracing::debug!("no biometric envelope stored; skipping prompt");
            return Ok(None);
        };
        let handle = self.keys.get_or_create_key(ProtectionTier::Biometric)?;
        let prepared = self.engine.prepare_open(&handle, &envelope)?;

        let authenticated = self
            .gate
            .authenticate(GatePurpose::Decrypt, prepared)
            .await
            .into_result()
            .inspect_err(|e| log_gate_failure(ProtectionTier::Biometric, e))?;

        let plaintext = self
            .engine
            .open_authenticated(authenticated, &envelope)
            .inspect_err(|e| log_open_failure(ProtectionTier::Biometric, e))?;
        Ok(Some(plaintext))
    }

    pub async fn retrieve(&self, tier: ProtectionTier) -> Result<Option<Vec<u8>>> {
        match tier {
            ProtectionTier::Standard => self.retrieve_standard(),
            ProtectionTier::Biometric => self.retrieve_biometric().await,
        }
    }

    fn load_envelope(&self, tier: ProtectionTier) -> Result<Option<Envelope>> {
        self.blobs
            .read(self.layout.envelope_name(tier))?
            .map(Envelope::from_bytes)
            .transpose()
    }

    // -- Metadata -------------------------------------------------------------

    /// Store the plaintext metadata document. Never touches keys or the gate.
    pub fn store_metadata(&self, json: &str) -> Result<()> {
        self.metadata.store(json)
    }

    pub fn get_metadata(&self) -> Result<Option<String>> {
        self.metadata.get()
    }

    // -- Wipe -----------------------------------------------------------------

    /// Delete the standard envelope and destroy the standard key.
    ///
    /// Missing file or key is not an error. Both deletions are attempted even
    /// if the first fails; the first error is returned. The biometric tier
    /// and metadata are left untouched.
    pub fn wipe(&self) -> Result<()> {
        self.wipe_tier(ProtectionTier::Standard)
    }

    /// Delete the biometric envelope and destroy the biometric key.
    pub fn wipe_biometric(&self) -> Result<()> {
        self.wipe_tier(ProtectionTier::Biometric)
    }

    fn wipe_tier(&self, tier: ProtectionTier) -> Result<()> {
        let file = self.blobs.remove(self.layout.envelope_name(tier));
        let key = self.keys.delete_key_if_present(tier);

        match (file, key) {
            (Ok(file_removed), Ok(key_removed)) => {
                tracing::info!(%tier, file_removed, key_removed, "wiped tier");
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(%tier, kind = %e.kind(), error = %e, "wipe failed");
                Err(e)
            }
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn state(&self, tier: ProtectionTier) -> Result<TierState> {
        if self.blobs.exists(self.layout.envelope_name(tier))? {
            Ok(TierState::Stored)
        } else {
            Ok(TierState::Empty)
        }
    }

    pub fn status(&self) -> Result<VaultStatus> {
        let tier_status = |tier| -> Result<TierStatus> {
            Ok(TierStatus {
                tier,
                state: self.state(tier)?,
                has_key: self.keys.has_key(tier)?,
            })
        };
        Ok(VaultStatus {
            standard: tier_status(ProtectionTier::Standard)?,
            biometric: tier_status(ProtectionTier::Biometric)?,
            has_metadata: self.metadata.exists()?,
        })
    }
}

fn log_gate_failure(tier: ProtectionTier, err: &VaultError) {
    match err {
        VaultError::AuthenticationDenied { reason } => {
            tracing::warn!(%tier, %reason, "biometric authentication denied");
        }
        other => {
            tracing::warn!(%tier, kind = %other.kind(), error = %other, "biometric authentication failed");
        }
    }
}

fn log_open_failure(tier: ProtectionTier, err: &VaultError) {
    tracing::error!(%tier, kind = %err.kind(), error = %err, "failed to open identity envelope");
}
