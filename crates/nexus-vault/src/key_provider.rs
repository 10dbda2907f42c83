//! Tiered key provisioning.
//!
//! [`KeyProvider`] maps each [`ProtectionTier`] to a fixed alias and a fixed
//! [`KeySpec`], and hands out opaque [`KeyHandle`]s. The two tiers differ only
//! in [`UserPresence`]; everything else about the keys is identical.
//!
//! Provisioning is idempotent: an existing key is never regenerated, because
//! doing so would silently orphan every envelope sealed under it.

use std::sync::Arc;

use crate::config::StorageLayout;
use crate::error::{Result, VaultError};
use crate::keystore::{KeySpec, SecureKeyStore, UserPresence};
use crate::tier::ProtectionTier;

/// Key properties per tier.
pub const fn tier_key_spec(tier: ProtectionTier) -> KeySpec {
    match tier {
        ProtectionTier::Standard => KeySpec::aead(UserPresence::NotRequired),
        ProtectionTier::Biometric => KeySpec::aead(UserPresence::EveryUse),
    }
}

/// Opaque reference to a key held by a [`SecureKeyStore`].
///
/// Carries no key material. The presence flag reflects the spec the key was
/// actually generated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    alias: String,
    tier: ProtectionTier,
    requires_presence: bool,
}

impl KeyHandle {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn tier(&self) -> ProtectionTier {
        self.tier
    }

    pub fn requires_presence(&self) -> bool {
        self.requires_presence
    }
}

/// Provisions and retrieves the per-tier keys.
pub struct KeyProvider {
    store: Arc<dyn SecureKeyStore>,
    standard_alias: String,
    biometric_alias: String,
}

impl KeyProvider {
    pub fn new(store: Arc<dyn SecureKeyStore>, layout: &StorageLayout) -> Self {
        Self {
            store,
            standard_alias: layout.standard_key_alias.clone(),
            biometric_alias: layout.biometric_key_alias.clone(),
        }
    }

    pub fn alias(&self, tier: ProtectionTier) -> &str {
        match tier {
            ProtectionTier::Standard => &self.standard_alias,
            ProtectionTier::Biometric => &self.biometric_alias,
        }
    }

    /// Return a handle to the tier's key, generating it on first use.
    pub fn get_or_create_key(&self, tier: ProtectionTier) -> Result<KeyHandle> {
        let alias = self.alias(tier);
        let wanted = tier_key_spec(tier);

        let spec = if self.store.contains_alias(alias)? {
            let existing = self.store.key_spec(alias)?;
            if existing != wanted {
                tracing::warn!(
                    %tier,
                    alias,
                    ?existing,
                    "existing key spec differs from tier profile; using it unchanged"
                );
            }
            tracing::debug!(%tier, alias, "using existing key");
            existing
        } else {
            self.store.generate_key(alias, wanted)?;
            tracing::info!(%tier, alias, "provisioned new key");
            wanted
        };

        Ok(KeyHandle {
            alias: alias.to_string(),
            tier,
            requires_presence: spec.requires_presence(),
        })
    }

    /// Whether the tier's key currently exists.
    pub fn has_key(&self, tier: ProtectionTier) -> Result<bool> {
        self.store.contains_alias(self.alias(tier))
    }

    /// Irrevocably destroy the tier's key.
    ///
    /// Returns [`VaultError::KeyNotFound`] if there is no key.
    pub fn delete_key(&self, tier: ProtectionTier) -> Result<()> {
        let alias = self.alias(tier);
        self.store.delete_key(alias)?;
        tracing::info!(%tier, alias, "deleted key");
        Ok(())
    }

    /// Like [`delete_key`](Self::delete_key) but treats a missing key as
    /// success. Returns whether a key was deleted.
    pub fn delete_key_if_present(&self, tier: ProtectionTier) -> Result<bool> {
        match self.delete_key(tier) {
            Ok(()) => Ok(true),
            Err(VaultError::KeyNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
