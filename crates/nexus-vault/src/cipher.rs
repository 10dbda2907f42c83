//! Envelope encryption over key handles.
//!
//! An [`Envelope`] is one contiguous buffer:
//!
//! ```text
//! [12 bytes: random nonce][ciphertext][16-byte GCM tag]
//! ```
//!
//! There is no version byte and no tier marker. The blob name an envelope is
//! stored under is what says which tier (and so which key) it belongs to.
//!
//! Every seal draws a fresh 96-bit nonce from the system CSPRNG. With random
//! nonces the collision probability stays negligible for up to ~2^32 seals
//! under one key, far beyond a vault that holds one record per tier.
//!
//! Standard-tier keys are used directly through [`CipherEngine::seal`] and
//! [`CipherEngine::open`]. Presence-bound keys go through a two-step flow:
//! [`CipherEngine::prepare_seal`] / [`CipherEngine::prepare_open`] produce a
//! [`PreparedCipher`] bound to a key store challenge; a biometric gate turns
//! it into an [`AuthenticatedCipher`], which is then finished with
//! [`CipherEngine::seal_authenticated`] / [`CipherEngine::open_authenticated`].

use std::fmt;
use std::sync::Arc;

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};
use crate::key_provider::KeyHandle;
use crate::keystore::{
    KeyPurpose, NONCE_LEN, OperationChallenge, PresenceProof, SecureKeyStore, TAG_LEN,
};
use crate::tier::ProtectionTier;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A sealed identity: `nonce || ciphertext || tag`.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Vec<u8>,
}

impl Envelope {
    /// Smallest valid envelope: a nonce and a tag around empty plaintext.
    pub const MIN_LEN: usize = NONCE_LEN + TAG_LEN;

    /// Wrap stored bytes, rejecting buffers too short to be an envelope.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(VaultError::MalformedEnvelope {
                len: bytes.len(),
                min: Self::MIN_LEN,
            });
        }
        Ok(Self { bytes })
    }

    fn frame(nonce: &[u8; NONCE_LEN], sealed: Vec<u8>) -> Self {
        let mut bytes = Vec::with_capacity(NONCE_LEN + sealed.len());
        bytes.extend_from_slice(nonce);
        bytes.extend_from_slice(&sealed);
        Self { bytes }
    }

    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&self.bytes[..NONCE_LEN]);
        nonce
    }

    /// Ciphertext with the tag appended.
    pub fn sealed(&self) -> &[u8] {
        &self.bytes[NONCE_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").field("len", &self.bytes.len()).finish()
    }
}

// ---------------------------------------------------------------------------
// Prepared and authenticated ciphers
// ---------------------------------------------------------------------------

/// A cipher bound to a key, a purpose and a nonce, not yet finalized.
///
/// For sealing the nonce is freshly generated; for opening it is the one
/// extracted from the stored envelope.
#[derive(Debug)]
pub struct PreparedCipher {
    handle: KeyHandle,
    purpose: KeyPurpose,
    nonce: [u8; NONCE_LEN],
    challenge: OperationChallenge,
}

impl PreparedCipher {
    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }

    pub fn tier(&self) -> ProtectionTier {
        self.handle.tier()
    }

    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn challenge(&self) -> OperationChallenge {
        self.challenge
    }
}

/// A prepared cipher whose key use has been authorized by a presence proof.
///
/// Only [`PresenceAuthority::attest`](crate::keystore::PresenceAuthority::attest)
/// constructs one.
#[derive(Debug)]
pub struct AuthenticatedCipher {
    cipher: PreparedCipher,
    proof: PresenceProof,
}

impl AuthenticatedCipher {
    pub(crate) fn new(cipher: PreparedCipher, proof: PresenceProof) -> Self {
        Self { cipher, proof }
    }

    pub fn cipher(&self) -> &PreparedCipher {
        &self.cipher
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Seals and opens envelopes through a [`SecureKeyStore`].
pub struct CipherEngine {
    store: Arc<dyn SecureKeyStore>,
    rng: SystemRandom,
}

impl CipherEngine {
    pub fn new(store: Arc<dyn SecureKeyStore>) -> Self {
        Self {
            store,
            rng: SystemRandom::new(),
        }
    }

    fn fresh_nonce(&self) -> Result<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| VaultError::EncryptionFailed {
                reason: "failed to generate random nonce".into(),
            })?;
        Ok(nonce)
    }

    /// Seal `plaintext` under a key that needs no presence proof.
    pub fn seal(&self, handle: &KeyHandle, plaintext: &[u8]) -> Result<Envelope> {
        let nonce = self.fresh_nonce()?;
        self.finish_seal(handle, &nonce, plaintext, None)
    }

    /// Open `envelope` under a key that needs no presence proof.
    pub fn open(&self, handle: &KeyHandle, envelope: &Envelope) -> Result<Vec<u8>> {
        self.finish_open(handle, envelope, None)
    }

    /// Bind a fresh nonce and a key store challenge for a gated seal.
    pub fn prepare_seal(&self, handle: &KeyHandle) -> Result<PreparedCipher> {
        let nonce = self.fresh_nonce()?;
        let challenge = self.store.begin_operation(handle.alias(), KeyPurpose::Seal)?;
        Ok(PreparedCipher {
            handle: handle.clone(),
            purpose: KeyPurpose::Seal,
            nonce,
            challenge,
        })
    }

    /// Bind the envelope's nonce and a key store challenge for a gated open.
    pub fn prepare_open(&self, handle: &KeyHandle, envelope: &Envelope) -> Result<PreparedCipher> {
        let challenge = self.store.begin_operation(handle.alias(), KeyPurpose::Open)?;
        Ok(PreparedCipher {
            handle: handle.clone(),
            purpose: KeyPurpose::Open,
            nonce: envelope.nonce(),
            challenge,
        })
    }

    /// Finish a gated seal.
    pub fn seal_authenticated(
        &self,
        authenticated: AuthenticatedCipher,
        plaintext: &[u8],
    ) -> Result<Envelope> {
        let AuthenticatedCipher { cipher, proof } = authenticated;
        if cipher.purpose != KeyPurpose::Seal {
            return Err(VaultError::invalid("cipher was prepared for opening, not sealing"));
        }
        self.finish_seal(&cipher.handle, &cipher.nonce, plaintext, Some(&proof))
    }

    /// Finish a gated open. `envelope` must be the one the cipher was
    /// prepared from.
    pub fn open_authenticated(
        &self,
        authenticated: AuthenticatedCipher,
        envelope: &Envelope,
    ) -> Result<Vec<u8>> {
        let AuthenticatedCipher { cipher, proof } = authenticated;
        if cipher.purpose != KeyPurpose::Open {
            return Err(VaultError::invalid("cipher was prepared for sealing, not opening"));
        }
        if cipher.nonce != envelope.nonce() {
            return Err(VaultError::invalid(
                "cipher was prepared for a different envelope",
            ));
        }
        self.finish_open(&cipher.handle, envelope, Some(&proof))
    }

    fn finish_seal(
        &self,
        handle: &KeyHandle,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
        proof: Option<&PresenceProof>,
    ) -> Result<Envelope> {
        let sealed = self.store.seal(handle.alias(), nonce, plaintext, proof)?;
        let envelope = Envelope::frame(nonce, sealed);
        tracing::trace!(
            tier = %handle.tier(),
            plaintext_len = plaintext.len(),
            envelope_len = envelope.as_bytes().len(),
            "sealed envelope"
        );
        Ok(envelope)
    }

    fn finish_open(
        &self,
        handle: &KeyHandle,
        envelope: &Envelope,
        proof: Option<&PresenceProof>,
    ) -> Result<Vec<u8>> {
        let plaintext = self
            .store
            .open(handle.alias(), &envelope.nonce(), envelope.sealed(), proof)?;
        tracing::trace!(
            tier = %handle.tier(),
            envelope_len = envelope.as_bytes().len(),
            plaintext_len = plaintext.len(),
            "opened envelope"
        );
        Ok(plaintext)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
