//! Secure key store contract.
//!
//! The vault never holds key bytes. Keys live inside a [`SecureKeyStore`]
//! (a platform keystore, a secure enclave, or the in-process
//! [`SoftwareKeyStore`](crate::software::SoftwareKeyStore)) and are addressed
//! by alias. The store runs the AEAD primitive itself; the vault supplies the
//! nonce and gets back ciphertext or plaintext.
//!
//! # Presence binding
//!
//! A key generated with [`UserPresence::EveryUse`] refuses every operation
//! that does not carry a valid [`PresenceProof`]. A proof is an HMAC-SHA256
//! tag over a single-use challenge issued by the store for one
//! `(alias, purpose)` pair, minted by a [`PresenceAuthority`] that shares its
//! MAC key with the store. Proofs cannot be reused, moved to another key, or
//! moved from sealing to opening.

use std::fmt;
use std::sync::Arc;

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use crate::cipher::{AuthenticatedCipher, PreparedCipher};
use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN: usize = ring::aead::NONCE_LEN;

/// Length of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Length of a symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// Domain separator mixed into every presence MAC.
const PROOF_DOMAIN: &[u8] = b"nexus-presence-v1";

// ---------------------------------------------------------------------------
// Key specs
// ---------------------------------------------------------------------------

/// What an operation intends to do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Seal,
    Open,
}

impl KeyPurpose {
    fn tag(self) -> u8 {
        match self {
            Self::Seal => 1,
            Self::Open => 2,
        }
    }
}

/// The only algorithm the vault provisions: AES-256 in GCM mode, no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Aes256GcmNoPadding,
}

/// Whether using the key demands a live proof of user presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPresence {
    NotRequired,
    /// A fresh proof for every single use; there is no caching window.
    EveryUse,
}

/// Properties fixed at key generation. A store must never change them
/// afterwards; downgrading presence means deleting and regenerating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub algorithm: KeyAlgorithm,
    pub allow_seal: bool,
    pub allow_open: bool,
    pub user_presence: UserPresence,
}

impl KeySpec {
    /// AES-256-GCM key usable for both sealing and opening.
    pub const fn aead(user_presence: UserPresence) -> Self {
        Self {
            algorithm: KeyAlgorithm::Aes256GcmNoPadding,
            allow_seal: true,
            allow_open: true,
            user_presence,
        }
    }

    pub fn permits(&self, purpose: KeyPurpose) -> bool {
        match purpose {
            KeyPurpose::Seal => self.allow_seal,
            KeyPurpose::Open => self.allow_open,
        }
    }

    pub fn requires_presence(&self) -> bool {
        self.user_presence == UserPresence::EveryUse
    }
}

// ---------------------------------------------------------------------------
// Challenges and proofs
// ---------------------------------------------------------------------------

/// Single-use challenge issued by a store for one pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationChallenge(u64);

impl OperationChallenge {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Draw a random challenge from the system CSPRNG.
    pub fn random(rng: &dyn SecureRandom) -> Result<Self> {
        let mut buf = [0u8; 8];
        rng.fill(&mut buf)
            .map_err(|_| VaultError::Internal("failed to generate operation challenge".into()))?;
        Ok(Self(u64::from_be_bytes(buf)))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Evidence that a user proved presence for exactly one operation.
#[derive(Clone)]
pub struct PresenceProof {
    challenge: OperationChallenge,
    alias: String,
    purpose: KeyPurpose,
    mac: Vec<u8>,
}

impl PresenceProof {
    pub fn challenge(&self) -> OperationChallenge {
        self.challenge
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }
}

impl fmt::Debug for PresenceProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceProof")
            .field("challenge", &self.challenge)
            .field("alias", &self.alias)
            .field("purpose", &self.purpose)
            .field("mac", &"<redacted>")
            .finish()
    }
}

/// Mints and verifies presence proofs.
///
/// The authority stands in for the platform authenticator: it shares its MAC
/// key with the key store, and a gate implementation asks it to attest a
/// prepared cipher only after the user has actually passed the check.
#[derive(Clone)]
pub struct PresenceAuthority {
    key: Arc<hmac::Key>,
}

impl PresenceAuthority {
    /// Create an authority with a fresh random MAC key.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &rng)
            .map_err(|_| VaultError::Internal("failed to generate presence MAC key".into()))?;
        Ok(Self { key: Arc::new(key) })
    }

    /// Authorize `cipher` after a successful presence check.
    pub fn attest(&self, cipher: PreparedCipher) -> AuthenticatedCipher {
        let proof = self.sign(cipher.handle().alias(), cipher.purpose(), cipher.challenge());
        AuthenticatedCipher::new(cipher, proof)
    }

    pub(crate) fn sign(
        &self,
        alias: &str,
        purpose: KeyPurpose,
        challenge: OperationChallenge,
    ) -> PresenceProof {
        let tag = hmac::sign(&self.key, &proof_message(alias, purpose, challenge));
        PresenceProof {
            challenge,
            alias: alias.to_string(),
            purpose,
            mac: tag.as_ref().to_vec(),
        }
    }

    /// Constant-time check that `proof` was minted by this authority.
    pub(crate) fn verify(&self, proof: &PresenceProof) -> bool {
        let message = proof_message(&proof.alias, proof.purpose, proof.challenge);
        hmac::verify(&self.key, &message, &proof.mac).is_ok()
    }
}

impl fmt::Debug for PresenceAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresenceAuthority { .. }")
    }
}

fn proof_message(alias: &str, purpose: KeyPurpose, challenge: OperationChallenge) -> Vec<u8> {
    let mut message = Vec::with_capacity(PROOF_DOMAIN.len() + 9 + alias.len());
    message.extend_from_slice(PROOF_DOMAIN);
    message.extend_from_slice(&challenge.value().to_be_bytes());
    message.push(purpose.tag());
    message.extend_from_slice(alias.as_bytes());
    message
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over a secure key store that owns symmetric keys.
///
/// Implementations must be `Send + Sync`. All errors must be key store
/// errors (see [`crate::error::ErrorKind::KeyStore`]) except
/// [`VaultError::AuthenticationTag`] from [`open`](Self::open).
pub trait SecureKeyStore: Send + Sync {
    /// Whether a key exists under `alias`.
    fn contains_alias(&self, alias: &str) -> Result<bool>;

    /// Generate a new key inside the store. Replaces any key already under
    /// `alias`.
    fn generate_key(&self, alias: &str, spec: KeySpec) -> Result<()>;

    /// The immutable spec of the key under `alias`.
    ///
    /// Returns [`VaultError::KeyNotFound`] if absent.
    fn key_spec(&self, alias: &str) -> Result<KeySpec>;

    /// Irrevocably destroy the key under `alias`.
    ///
    /// Returns [`VaultError::KeyNotFound`] if absent.
    fn delete_key(&self, alias: &str) -> Result<()>;

    /// Register a pending operation and return its single-use challenge.
    fn begin_operation(&self, alias: &str, purpose: KeyPurpose) -> Result<OperationChallenge>;

    /// AEAD-seal `plaintext` under `nonce` with no associated data.
    /// Returns ciphertext with the tag appended.
    fn seal(
        &self,
        alias: &str,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
        proof: Option<&PresenceProof>,
    ) -> Result<Vec<u8>>;

    /// AEAD-open `sealed` (ciphertext with tag). Never returns partial
    /// plaintext: a tag mismatch is [`VaultError::AuthenticationTag`].
    fn open(
        &self,
        alias: &str,
        nonce: &[u8; NONCE_LEN],
        sealed: &[u8],
        proof: Option<&PresenceProof>,
    ) -> Result<Vec<u8>>;
}
