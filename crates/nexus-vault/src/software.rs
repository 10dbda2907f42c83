//! In-process secure key store.
//!
//! [`SoftwareKeyStore`] implements [`SecureKeyStore`] without hardware
//! support. It is the fallback on hosts with no platform keystore and the
//! store used by tests. Keys are generated from the system CSPRNG, held in
//! zeroizing buffers, and only ever used through the trait's AEAD methods.
//!
//! A store is either volatile ([`SoftwareKeyStore::in_memory`]) or backed by a
//! directory ([`SoftwareKeyStore::open`]). On disk each key gets one file,
//! `<alias>.key`, with this layout:
//!
//! ```text
//! [32 bytes: PBKDF2 salt]
//! [12 bytes: AES-256-GCM nonce]
//! [remaining: AES-256-GCM(flags || key) + 16-byte tag, AAD = alias]
//! ```
//!
//! The wrapping key is derived from machine identifiers (hostname, username)
//! and an application salt. This does not match a hardware keystore: anyone
//! with access to the same machine account can rebuild it.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::{Zeroize, Zeroizing};

use crate::blob::write_atomic;
use crate::config::validate_name;
use crate::error::{Result, VaultError};
use crate::keystore::{
    KEY_LEN, KeyAlgorithm, KeyPurpose, KeySpec, NONCE_LEN, OperationChallenge, PresenceAuthority,
    PresenceProof, SecureKeyStore, TAG_LEN, UserPresence,
};

/// Length of the PBKDF2 salt in bytes.
const SALT_LEN: usize = 32;

/// PBKDF2 iteration count, OWASP 2023 recommendation for HMAC-SHA256.
const PBKDF2_ITERATIONS: u32 = 600_000;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

/// Application salt for the device-derived wrapping key. Changing this
/// invalidates every stored key file.
const APP_SALT: &[u8; SALT_LEN] = b"nexus-vault-keystore-v1\x00\x00\x00\x00\x00\x00\x00\x00\x00";

const KEY_FILE_EXT: &str = "key";

/// Upper bound on outstanding challenges; the oldest is dropped beyond it.
const MAX_PENDING_OPERATIONS: usize = 64;

const FLAG_SEAL: u8 = 0b001;
const FLAG_OPEN: u8 = 0b010;
const FLAG_PRESENCE: u8 = 0b100;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors, so each
/// bound key is used for a single operation.
struct SingleNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

fn seal_with(
    material: &[u8],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let unbound = UnboundKey::new(AEAD_ALG, material).map_err(|_| VaultError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(*nonce)));

    let mut in_out = Vec::with_capacity(plaintext.len() + TAG_LEN);
    in_out.extend_from_slice(plaintext);
    sealing_key
        .seal_in_place_append_tag(Aad::from(aad), &mut in_out)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;
    Ok(in_out)
}

fn open_with(
    material: &[u8],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    sealed: &[u8],
) -> Result<Vec<u8>> {
    let unbound = UnboundKey::new(AEAD_ALG, material)
        .map_err(|_| VaultError::Internal("failed to create AES-256-GCM key".into()))?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce(Some(*nonce)));

    let mut in_out = sealed.to_vec();
    match opening_key.open_in_place(Aad::from(aad), &mut in_out) {
        Ok(plaintext) => Ok(plaintext.to_vec()),
        Err(_) => {
            in_out.zeroize();
            Err(VaultError::AuthenticationTag)
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct StoredKey {
    spec: KeySpec,
    material: Zeroizing<[u8; KEY_LEN]>,
}

struct PendingOperation {
    challenge: OperationChallenge,
    alias: String,
    purpose: KeyPurpose,
}

struct KeyFiles {
    dir: PathBuf,
    wrapping_key: Zeroizing<[u8; KEY_LEN]>,
}

/// Software implementation of [`SecureKeyStore`].
pub struct SoftwareKeyStore {
    keys: Mutex<HashMap<String, StoredKey>>,
    pending: Mutex<VecDeque<PendingOperation>>,
    authority: PresenceAuthority,
    files: Option<KeyFiles>,
    rng: SystemRandom,
}

impl SoftwareKeyStore {
    /// A volatile store whose keys vanish when it is dropped.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            keys: Mutex::new(HashMap::new()),
            pending: Mutex::new(VecDeque::new()),
            authority: PresenceAuthority::generate()?,
            files: None,
            rng: SystemRandom::new(),
        })
    }

    /// Open (or create) a persistent store in `dir` and load its keys.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, e))?;

        let files = KeyFiles {
            dir,
            wrapping_key: device_derived_key(),
        };
        let keys = files.load_all()?;
        tracing::info!(dir = %files.dir.display(), count = keys.len(), "opened software key store");

        Ok(Self {
            keys: Mutex::new(keys),
            pending: Mutex::new(VecDeque::new()),
            authority: PresenceAuthority::generate()?,
            files: Some(files),
            rng: SystemRandom::new(),
        })
    }

    /// The authority whose proofs this store accepts. Hand it to the
    /// biometric gate implementation only.
    pub fn presence_authority(&self) -> PresenceAuthority {
        self.authority.clone()
    }

    fn keys(&self) -> Result<MutexGuard<'_, HashMap<String, StoredKey>>> {
        self.keys
            .lock()
            .map_err(|e| VaultError::Internal(format!("key table poisoned: {e}")))
    }

    fn pending(&self) -> Result<MutexGuard<'_, VecDeque<PendingOperation>>> {
        self.pending
            .lock()
            .map_err(|e| VaultError::Internal(format!("challenge table poisoned: {e}")))
    }

    /// Enforce purpose and presence rules for one use of `alias`.
    fn authorize(
        &self,
        alias: &str,
        spec: &KeySpec,
        purpose: KeyPurpose,
        proof: Option<&PresenceProof>,
    ) -> Result<()> {
        if !spec.permits(purpose) {
            return Err(VaultError::KeyOperationRefused {
                alias: alias.to_string(),
                reason: format!("{purpose:?} is not a permitted purpose"),
            });
        }
        if !spec.requires_presence() {
            return Ok(());
        }

        let proof = proof.ok_or_else(|| VaultError::PresenceRequired {
            alias: alias.to_string(),
        })?;
        let rejected = |reason: &str| VaultError::PresenceRejected {
            alias: alias.to_string(),
            reason: reason.to_string(),
        };

        if proof.alias() != alias || proof.purpose() != purpose {
            return Err(rejected("proof is bound to a different operation"));
        }
        if !self.authority.verify(proof) {
            return Err(rejected("proof signature is invalid"));
        }

        // Consume the challenge: each proof authorizes exactly one use.
        let mut pending = self.pending()?;
        let position = pending.iter().position(|op| {
            op.challenge == proof.challenge() && op.alias == alias && op.purpose == purpose
        });
        match position {
            Some(index) => {
                pending.remove(index);
                Ok(())
            }
            None => Err(rejected("challenge is unknown or already used")),
        }
    }
}

impl SecureKeyStore for SoftwareKeyStore {
    fn contains_alias(&self, alias: &str) -> Result<bool> {
        Ok(self.keys()?.contains_key(alias))
    }

    fn generate_key(&self, alias: &str, spec: KeySpec) -> Result<()> {
        validate_name(alias)?;
        if spec.algorithm != KeyAlgorithm::Aes256GcmNoPadding {
            return Err(VaultError::KeyOperationRefused {
                alias: alias.to_string(),
                reason: "unsupported key algorithm".into(),
            });
        }

        let mut material = Zeroizing::new([0u8; KEY_LEN]);
        self.rng
            .fill(&mut material[..])
            .map_err(|_| VaultError::KeyStoreUnavailable {
                reason: "failed to generate key material".into(),
            })?;

        if let Some(files) = &self.files {
            files.write(alias, &spec, &material, &self.rng)?;
        }

        self.keys()?
            .insert(alias.to_string(), StoredKey { spec, material });
        tracing::info!(
            alias,
            presence = ?spec.user_presence,
            "generated key in software key store"
        );
        Ok(())
    }

    fn key_spec(&self, alias: &str) -> Result<KeySpec> {
        self.keys()?
            .get(alias)
            .map(|key| key.spec)
            .ok_or_else(|| VaultError::KeyNotFound {
                alias: alias.to_string(),
            })
    }

    fn delete_key(&self, alias: &str) -> Result<()> {
        let mut keys = self.keys()?;
        if !keys.contains_key(alias) {
            return Err(VaultError::KeyNotFound {
                alias: alias.to_string(),
            });
        }
        // File first: if it cannot be removed the key must stay visible here
        // too, since it would come back on the next open.
        if let Some(files) = &self.files {
            files.remove(alias)?;
        }
        keys.remove(alias);
        drop(keys);
        self.pending()?.retain(|op| op.alias != alias);
        tracing::info!(alias, "deleted key from software key store");
        Ok(())
    }

    fn begin_operation(&self, alias: &str, purpose: KeyPurpose) -> Result<OperationChallenge> {
        let spec = self.key_spec(alias)?;
        if !spec.permits(purpose) {
            return Err(VaultError::KeyOperationRefused {
                alias: alias.to_string(),
                reason: format!("{purpose:?} is not a permitted purpose"),
            });
        }

        let challenge = OperationChallenge::random(&self.rng)?;
        let mut pending = self.pending()?;
        if pending.len() >= MAX_PENDING_OPERATIONS {
            pending.pop_front();
        }
        pending.push_back(PendingOperation {
            challenge,
            alias: alias.to_string(),
            purpose,
        });
        Ok(challenge)
    }

    fn seal(
        &self,
        alias: &str,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
        proof: Option<&PresenceProof>,
    ) -> Result<Vec<u8>> {
        let keys = self.keys()?;
        let key = keys.get(alias).ok_or_else(|| VaultError::KeyNotFound {
            alias: alias.to_string(),
        })?;
        self.authorize(alias, &key.spec, KeyPurpose::Seal, proof)?;
        seal_with(&key.material[..], nonce, &[], plaintext)
    }

    fn open(
        &self,
        alias: &str,
        nonce: &[u8; NONCE_LEN],
        sealed: &[u8],
        proof: Option<&PresenceProof>,
    ) -> Result<Vec<u8>> {
        let keys = self.keys()?;
        let key = keys.get(alias).ok_or_else(|| VaultError::KeyNotFound {
            alias: alias.to_string(),
        })?;
        self.authorize(alias, &key.spec, KeyPurpose::Open, proof)?;
        open_with(&key.material[..], nonce, &[], sealed)
    }
}

// ---------------------------------------------------------------------------
// Key files
// ---------------------------------------------------------------------------

impl KeyFiles {
    fn path_for(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}.{KEY_FILE_EXT}"))
    }

    fn write(
        &self,
        alias: &str,
        spec: &KeySpec,
        material: &[u8; KEY_LEN],
        rng: &SystemRandom,
    ) -> Result<()> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce)
            .map_err(|_| VaultError::KeyStoreUnavailable {
                reason: "failed to generate key file nonce".into(),
            })?;

        let mut plain = Zeroizing::new(Vec::with_capacity(1 + KEY_LEN));
        plain.push(encode_flags(spec));
        plain.extend_from_slice(material);

        let sealed = seal_with(&self.wrapping_key[..], &nonce, alias.as_bytes(), &plain)?;

        let mut data = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
        data.extend_from_slice(APP_SALT);
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&sealed);

        let path = self.path_for(alias);
        write_atomic(&path, &data).map_err(|e| unavailable(&path, e))?;
        tracing::debug!(path = %path.display(), "wrote key file");
        Ok(())
    }

    fn remove(&self, alias: &str) -> Result<()> {
        let path = self.path_for(alias);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    fn load_all(&self) -> Result<HashMap<String, StoredKey>> {
        let mut keys = HashMap::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|e| unavailable(&self.dir, e))?;

        for entry in entries {
            let path = entry.map_err(|e| unavailable(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_FILE_EXT) {
                continue;
            }
            let Some(alias) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = self.load(&path, alias)?;
            keys.insert(alias.to_string(), key);
        }
        Ok(keys)
    }

    fn load(&self, path: &Path, alias: &str) -> Result<StoredKey> {
        let data = std::fs::read(path).map_err(|e| unavailable(path, e))?;
        let corrupt = |reason: &str| VaultError::KeyStoreUnavailable {
            reason: format!("key file {} is corrupt: {reason}", path.display()),
        };

        if data.len() != SALT_LEN + NONCE_LEN + 1 + KEY_LEN + TAG_LEN {
            return Err(corrupt("unexpected length"));
        }
        let (salt, rest) = data.split_at(SALT_LEN);
        if salt != APP_SALT {
            return Err(corrupt("unknown salt"));
        }
        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        let plain = Zeroizing::new(
            open_with(&self.wrapping_key[..], &nonce, alias.as_bytes(), sealed)
                .map_err(|_| corrupt("wrapping key mismatch or tampered file"))?,
        );
        let spec = decode_flags(plain[0]).ok_or_else(|| corrupt("unknown flags"))?;

        let mut material = Zeroizing::new([0u8; KEY_LEN]);
        material.copy_from_slice(&plain[1..]);
        Ok(StoredKey { spec, material })
    }
}

fn encode_flags(spec: &KeySpec) -> u8 {
    let mut flags = 0;
    if spec.allow_seal {
        flags |= FLAG_SEAL;
    }
    if spec.allow_open {
        flags |= FLAG_OPEN;
    }
    if spec.requires_presence() {
        flags |= FLAG_PRESENCE;
    }
    flags
}

fn decode_flags(flags: u8) -> Option<KeySpec> {
    if flags & !(FLAG_SEAL | FLAG_OPEN | FLAG_PRESENCE) != 0 {
        return None;
    }
    Some(KeySpec {
        algorithm: KeyAlgorithm::Aes256GcmNoPadding,
        allow_seal: flags & FLAG_SEAL != 0,
        allow_open: flags & FLAG_OPEN != 0,
        user_presence: if flags & FLAG_PRESENCE != 0 {
            UserPresence::EveryUse
        } else {
            UserPresence::NotRequired
        },
    })
}

fn unavailable(path: &Path, err: std::io::Error) -> VaultError {
    VaultError::KeyStoreUnavailable {
        reason: format!("{}: {err}", path.display()),
    }
}

/// Derive the key-file wrapping key from machine identifiers.
fn device_derived_key() -> Zeroizing<[u8; KEY_LEN]> {
    let hostname = hostname();
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".into());

    let mut material = Zeroizing::new(Vec::with_capacity(
        hostname.len() + username.len() + APP_SALT.len(),
    ));
    material.extend_from_slice(hostname.as_bytes());
    material.extend_from_slice(username.as_bytes());
    material.extend_from_slice(APP_SALT);

    let iterations = std::num::NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(std::num::NonZeroU32::MIN);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(PBKDF2_ALG, iterations, APP_SALT, &material, &mut key[..]);
    key
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        std::fs::read_to_string("/etc/hostname")
            .map(|s| s.trim().to_string())
            .or_else(|_| std::env::var("HOSTNAME"))
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "unknown-host".into())
    }

    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "unknown-host".into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ALIAS: &str = "test_key";
    const NONCE: [u8; NONCE_LEN] = [7u8; NONCE_LEN];

    #[test]
    fn seal_open_roundtrip() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::NotRequired))
            .unwrap();

        let sealed = store.seal(ALIAS, &NONCE, b"identity", None).unwrap();
        assert_eq!(sealed.len(), b"identity".len() + TAG_LEN);
        let opened = store.open(ALIAS, &NONCE, &sealed, None).unwrap();
        assert_eq!(opened, b"identity");
    }

    #[test]
    fn tampered_ciphertext_is_tag_error() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::NotRequired))
            .unwrap();

        let mut sealed = store.seal(ALIAS, &NONCE, b"identity", None).unwrap();
        sealed[0] ^= 0x01;
        let result = store.open(ALIAS, &NONCE, &sealed, None);
        assert!(matches!(result, Err(VaultError::AuthenticationTag)));
    }

    #[test]
    fn presence_key_refuses_without_proof() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::EveryUse))
            .unwrap();

        let result = store.seal(ALIAS, &NONCE, b"identity", None);
        assert!(matches!(result, Err(VaultError::PresenceRequired { .. })));
    }

    #[test]
    fn presence_proof_is_single_use() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::EveryUse))
            .unwrap();

        let challenge = store.begin_operation(ALIAS, KeyPurpose::Seal).unwrap();
        let proof = store
            .presence_authority()
            .sign(ALIAS, KeyPurpose::Seal, challenge);

        store.seal(ALIAS, &NONCE, b"once", Some(&proof)).unwrap();
        let replay = store.seal(ALIAS, &NONCE, b"twice", Some(&proof));
        assert!(matches!(replay, Err(VaultError::PresenceRejected { .. })));
    }

    #[test]
    fn seal_proof_cannot_open() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::EveryUse))
            .unwrap();

        let challenge = store.begin_operation(ALIAS, KeyPurpose::Seal).unwrap();
        let proof = store
            .presence_authority()
            .sign(ALIAS, KeyPurpose::Seal, challenge);

        let result = store.open(ALIAS, &NONCE, &[0u8; 32], Some(&proof));
        assert!(matches!(result, Err(VaultError::PresenceRejected { .. })));
    }

    #[test]
    fn foreign_authority_rejected() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::EveryUse))
            .unwrap();

        let challenge = store.begin_operation(ALIAS, KeyPurpose::Seal).unwrap();
        let forged = PresenceAuthority::generate()
            .unwrap()
            .sign(ALIAS, KeyPurpose::Seal, challenge);

        let result = store.seal(ALIAS, &NONCE, b"x", Some(&forged));
        assert!(matches!(result, Err(VaultError::PresenceRejected { .. })));
    }

    #[test]
    fn delete_missing_key_is_not_found() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        let result = store.delete_key(ALIAS);
        assert!(matches!(result, Err(VaultError::KeyNotFound { .. })));
    }

    #[test]
    fn pending_challenges_are_bounded() {
        let store = SoftwareKeyStore::in_memory().unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::EveryUse))
            .unwrap();

        for _ in 0..(MAX_PENDING_OPERATIONS * 2) {
            store.begin_operation(ALIAS, KeyPurpose::Open).unwrap();
        }
        assert_eq!(store.pending().unwrap().len(), MAX_PENDING_OPERATIONS);
    }

    #[test]
    fn flags_roundtrip() {
        for presence in [UserPresence::NotRequired, UserPresence::EveryUse] {
            let spec = KeySpec::aead(presence);
            assert_eq!(decode_flags(encode_flags(&spec)), Some(spec));
        }
        assert_eq!(decode_flags(0b1000), None);
    }

    #[test]
    fn persistent_store_reloads_keys_and_specs() {
        let dir = tempfile::tempdir().unwrap();

        let sealed = {
            let store = SoftwareKeyStore::open(dir.path()).unwrap();
            store
                .generate_key(ALIAS, KeySpec::aead(UserPresence::NotRequired))
                .unwrap();
            store
                .generate_key("bio", KeySpec::aead(UserPresence::EveryUse))
                .unwrap();
            store.seal(ALIAS, &NONCE, b"survives restart", None).unwrap()
        };

        let reopened = SoftwareKeyStore::open(dir.path()).unwrap();
        assert!(reopened.contains_alias(ALIAS).unwrap());
        assert!(reopened.key_spec("bio").unwrap().requires_presence());
        let opened = reopened.open(ALIAS, &NONCE, &sealed, None).unwrap();
        assert_eq!(opened, b"survives restart");

        reopened.delete_key(ALIAS).unwrap();
        assert!(!dir.path().join("test_key.key").exists());
        let again = SoftwareKeyStore::open(dir.path()).unwrap();
        assert!(!again.contains_alias(ALIAS).unwrap());
    }

    #[test]
    fn failed_key_file_removal_keeps_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = SoftwareKeyStore::open(dir.path()).unwrap();
        store
            .generate_key(ALIAS, KeySpec::aead(UserPresence::NotRequired))
            .unwrap();

        // A non-empty directory in place of the key file cannot be unlinked.
        let key_path = dir.path().join("test_key.key");
        std::fs::remove_file(&key_path).unwrap();
        std::fs::create_dir(&key_path).unwrap();
        std::fs::write(key_path.join("pin"), b"x").unwrap();

        let err = store.delete_key(ALIAS).unwrap_err();
        assert!(matches!(err, VaultError::KeyStoreUnavailable { .. }));
        assert!(store.contains_alias(ALIAS).unwrap());
        assert!(store.seal(ALIAS, &NONCE, b"still usable", None).is_ok());
    }

    #[test]
    fn corrupt_key_file_is_key_store_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.key"), b"not a key file").unwrap();

        let result = SoftwareKeyStore::open(dir.path());
        assert!(matches!(result, Err(VaultError::KeyStoreUnavailable { .. })));
    }
}
