//! Boolean host surface.
//!
//! Host bindings that cannot carry typed errors across their boundary get
//! this thin wrapper: every operation reports success as `bool` or `Option`
//! and logs the underlying [`VaultError`] with its [`ErrorKind`] before
//! collapsing it. Hosts that can handle errors should use [`Vault`] directly.
//!
//! [`ErrorKind`]: crate::error::ErrorKind

use crate::error::{Result, VaultError};
use crate::tier::ProtectionTier;
use crate::vault::Vault;

pub struct SecureStorage {
    vault: Vault,
}

impl SecureStorage {
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub async fn store(&self, tier: ProtectionTier, blob: &[u8]) -> bool {
        report("store", Some(tier), self.vault.store(tier, blob).await).is_some()
    }

    /// `None` both when nothing is stored and when retrieval failed; the log
    /// tells the two apart.
    pub async fn retrieve(&self, tier: ProtectionTier) -> Option<Vec<u8>> {
        report("retrieve", Some(tier), self.vault.retrieve(tier).await).flatten()
    }

    pub async fn import_identity(&self, tier: ProtectionTier, blob: &[u8]) -> bool {
        let result = match tier {
            ProtectionTier::Standard => self.vault.import_identity(blob),
            ProtectionTier::Biometric => self.vault.import_identity_biometric(blob).await,
        };
        report("import_identity", Some(tier), result).is_some()
    }

    pub fn store_metadata(&self, json: &str) -> bool {
        report("store_metadata", None, self.vault.store_metadata(json)).is_some()
    }

    pub fn get_metadata(&self) -> Option<String> {
        report("get_metadata", None, self.vault.get_metadata()).flatten()
    }

    pub fn wipe(&self) -> bool {
        report("wipe", None, self.vault.wipe()).is_some()
    }
}

fn report<T>(op: &'static str, tier: Option<ProtectionTier>, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(VaultError::AuthenticationDenied { reason }) => {
            tracing::info!(op, ?tier, %reason, "operation cancelled by user");
            None
        }
        Err(e) => {
            tracing::error!(op, ?tier, kind = %e.kind(), retriable = e.is_retriable(), error = %e, "vault operation failed");
            None
        }
    }
}
