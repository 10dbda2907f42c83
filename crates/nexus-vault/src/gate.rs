//! Biometric gate contract.
//!
//! The vault does not talk to sensors or draw prompts. It hands a
//! [`PreparedCipher`] to a [`BiometricGate`] and waits for exactly one
//! [`GateOutcome`]. A host implementation shows its prompt, and on success
//! asks its [`PresenceAuthority`](crate::keystore::PresenceAuthority) to
//! attest the cipher.
//!
//! The call may suspend for as long as the user takes; the vault imposes no
//! timeout and never calls the gate twice for one store or retrieve.

use async_trait::async_trait;

use crate::cipher::{AuthenticatedCipher, PreparedCipher};
use crate::error::VaultError;

/// Why the vault is asking for presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatePurpose {
    Encrypt,
    Decrypt,
}

impl GatePurpose {
    /// Title a host prompt should show.
    pub fn prompt_title(&self) -> &'static str {
        match self {
            Self::Encrypt => "Authenticate to store identity",
            Self::Decrypt => "Authenticate to access identity",
        }
    }
}

/// Result of one authentication attempt.
#[derive(Debug)]
pub enum GateOutcome {
    /// The user proved presence; the cipher may now use its key.
    Authenticated(AuthenticatedCipher),
    /// The user cancelled or failed the check. Terminal for this call.
    Denied { reason: String },
    /// Sensor or system fault. The caller may try again.
    Error { reason: String },
}

impl GateOutcome {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Collapse into the vault's error taxonomy.
    pub fn into_result(self) -> Result<AuthenticatedCipher, VaultError> {
        match self {
            Self::Authenticated(cipher) => Ok(cipher),
            Self::Denied { reason } => Err(VaultError::AuthenticationDenied { reason }),
            Self::Error { reason } => Err(VaultError::AuthenticationFailed { reason }),
        }
    }
}

/// Host-provided live presence check.
#[async_trait]
pub trait BiometricGate: Send + Sync {
    /// Run one authentication attempt for `cipher`.
    async fn authenticate(&self, purpose: GatePurpose, cipher: PreparedCipher) -> GateOutcome;
}

/// Gate for hosts without biometric hardware or without a UI to prompt on.
/// Every attempt is a system error.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGate;

#[async_trait]
impl BiometricGate for UnavailableGate {
    async fn authenticate(&self, purpose: GatePurpose, _cipher: PreparedCipher) -> GateOutcome {
        tracing::warn!(?purpose, "biometric gate requested but none is available");
        GateOutcome::error("biometric authentication is not available on this host")
    }
}
