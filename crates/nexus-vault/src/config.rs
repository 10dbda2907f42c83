//! Vault configuration.
//!
//! A [`VaultConfig`] says where the vault lives on disk and which stable names
//! it uses for envelopes, metadata and key aliases. Defaults match the layout
//! already deployed on devices, so changing a name orphans existing records.
//!
//! ```toml
//! data_dir = "/var/lib/nexus"
//!
//! [layout]
//! standard_envelope = "nexus_identity.enc"
//! biometric_envelope = "nexus_identity_bio.enc"
//! metadata = "nexus_meta.json"
//! standard_key_alias = "nexus_master_key"
//! biometric_key_alias = "nexus_biometric_key"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::tier::ProtectionTier;

/// Environment variable that overrides [`VaultConfig::data_dir`].
pub const DATA_DIR_ENV: &str = "NEXUS_VAULT_DIR";

/// Stable names for everything the vault persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    pub standard_envelope: String,
    pub biometric_envelope: String,
    pub metadata: String,
    pub standard_key_alias: String,
    pub biometric_key_alias: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            standard_envelope: "nexus_identity.enc".into(),
            biometric_envelope: "nexus_identity_bio.enc".into(),
            metadata: "nexus_meta.json".into(),
            standard_key_alias: "nexus_master_key".into(),
            biometric_key_alias: "nexus_biometric_key".into(),
        }
    }
}

impl StorageLayout {
    /// Blob name holding the envelope for `tier`.
    pub fn envelope_name(&self, tier: ProtectionTier) -> &str {
        match tier {
            ProtectionTier::Standard => &self.standard_envelope,
            ProtectionTier::Biometric => &self.biometric_envelope,
        }
    }

    /// Key store alias for `tier`.
    pub fn key_alias(&self, tier: ProtectionTier) -> &str {
        match tier {
            ProtectionTier::Standard => &self.standard_key_alias,
            ProtectionTier::Biometric => &self.biometric_key_alias,
        }
    }

    /// Reject layouts where two records would collide.
    pub fn validate(&self) -> Result<()> {
        let blobs = [
            &self.standard_envelope,
            &self.biometric_envelope,
            &self.metadata,
        ];
        let aliases = [&self.standard_key_alias, &self.biometric_key_alias];

        for name in blobs.iter().chain(aliases.iter()) {
            validate_name(name)?;
        }

        let unique_blobs: HashSet<_> = blobs.iter().collect();
        if unique_blobs.len() != blobs.len() {
            return Err(VaultError::invalid("blob names in layout must be distinct"));
        }
        if self.standard_key_alias == self.biometric_key_alias {
            return Err(VaultError::invalid("key aliases in layout must be distinct"));
        }
        Ok(())
    }
}

/// Validate a blob name or key alias: non-empty, no path components.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VaultError::invalid("name must not be empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(VaultError::invalid(format!(
            "name must be a plain file name: {name:?}"
        )));
    }
    Ok(())
}

/// Top-level vault configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory holding envelopes, metadata and (for the software key
    /// store) key files.
    pub data_dir: PathBuf,
    pub layout: StorageLayout,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            layout: StorageLayout::default(),
        }
    }
}

impl VaultConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.layout.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| VaultError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded vault config");
        Ok(config)
    }

    /// Apply environment overrides (currently only [`DATA_DIR_ENV`]).
    pub fn with_env_overrides(self) -> Self {
        self.with_data_dir_override(std::env::var(DATA_DIR_ENV).ok())
    }

    fn with_data_dir_override(mut self, dir: Option<String>) -> Self {
        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Directory used by the persistent software key store.
    pub fn key_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }
}
