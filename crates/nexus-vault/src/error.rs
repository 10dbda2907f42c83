//! Vault error types.
//!
//! Every public API in this crate returns [`VaultError`]. Each variant maps to
//! exactly one [`ErrorKind`], which is what callers (and the boolean surface in
//! [`crate::surface`]) use to tell a user-declined prompt apart from a corrupt
//! record or a broken key store.

use std::fmt;

/// Unified error type for the Nexus identity vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Argument errors ----------------------------------------------------
    /// Missing or malformed caller input. Raised before storage is touched.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // -- Key store errors ---------------------------------------------------
    /// No key exists under the alias.
    #[error("key not found: alias={alias}")]
    KeyNotFound { alias: String },

    /// The key store could not be reached or its contents are unreadable.
    #[error("key store unavailable: {reason}")]
    KeyStoreUnavailable { reason: String },

    /// The key exists but its spec does not permit the requested use.
    #[error("key store refused operation on {alias}: {reason}")]
    KeyOperationRefused { alias: String, reason: String },

    /// The key requires a fresh proof of user presence and none was given.
    #[error("key {alias} requires proof of user presence")]
    PresenceRequired { alias: String },

    /// A presence proof was supplied but is forged, stale, or bound to a
    /// different operation.
    #[error("presence proof rejected for {alias}: {reason}")]
    PresenceRejected { alias: String, reason: String },

    // -- Biometric gate -----------------------------------------------------
    /// The user cancelled or failed the biometric check.
    #[error("authentication denied: {reason}")]
    AuthenticationDenied { reason: String },

    /// The biometric gate hit a sensor or system fault.
    #[error("authentication error: {reason}")]
    AuthenticationFailed { reason: String },

    // -- Envelope errors ----------------------------------------------------
    /// The stored buffer is too short to hold a nonce and a tag.
    #[error("malformed envelope: {len} bytes, need at least {min}")]
    MalformedEnvelope { len: usize, min: usize },

    /// AEAD open failed: wrong key or tampered ciphertext.
    #[error("envelope authentication tag mismatch")]
    AuthenticationTag,

    /// Sealing failed inside the key store (RNG or primitive failure).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    // -- Underlying errors --------------------------------------------------
    /// I/O error from the blob store or key files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors. Prefer a typed variant.
    #[error("internal vault error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Argument,
    KeyStore,
    AuthenticationDenied,
    Authentication,
    MalformedEnvelope,
    AuthenticationTag,
    Io,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::KeyStore => "key_store",
            Self::AuthenticationDenied => "authentication_denied",
            Self::Authentication => "authentication",
            Self::MalformedEnvelope => "malformed_envelope",
            Self::AuthenticationTag => "authentication_tag",
            Self::Io => "io",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::Argument,
            Self::KeyNotFound { .. }
            | Self::KeyStoreUnavailable { .. }
            | Self::KeyOperationRefused { .. }
            | Self::PresenceRequired { .. }
            | Self::PresenceRejected { .. } => ErrorKind::KeyStore,
            Self::AuthenticationDenied { .. } => ErrorKind::AuthenticationDenied,
            Self::AuthenticationFailed { .. } => ErrorKind::Authentication,
            Self::MalformedEnvelope { .. } => ErrorKind::MalformedEnvelope,
            Self::AuthenticationTag => ErrorKind::AuthenticationTag,
            Self::Io(_) => ErrorKind::Io,
            Self::ConfigParse(_) | Self::Config { .. } => ErrorKind::Config,
            Self::EncryptionFailed { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may sensibly re-invoke the same operation.
    ///
    /// The vault itself never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthenticationDenied | ErrorKind::Authentication | ErrorKind::Io
        )
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}
