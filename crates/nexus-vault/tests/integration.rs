//! Integration tests for the nexus-vault crate.
//!
//! These tests drive the full vault lifecycle through the public API: both
//! protection tiers, the biometric gate, metadata, wipe, and persistence
//! across process restarts.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use nexus_vault::{
    BiometricGate, BlobStore, Envelope, ErrorKind, FileBlobStore, GateOutcome, GatePurpose,
    PreparedCipher, PresenceAuthority, ProtectionTier, SecureKeyStore, SoftwareKeyStore,
    StorageLayout, TierState, Vault, VaultError,
};

// ═══════════════════════════════════════════════════════════════════════
//  Test doubles
// ═══════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Allow,
    Deny,
    Fail,
}

/// Biometric gate stub that counts prompts and answers according to `mode`.
struct CountingGate {
    authority: PresenceAuthority,
    mode: Mode,
    calls: AtomicUsize,
    purposes: std::sync::Mutex<Vec<GatePurpose>>,
}

impl CountingGate {
    fn new(authority: PresenceAuthority, mode: Mode) -> Self {
        Self {
            authority,
            mode,
            calls: AtomicUsize::new(0),
            purposes: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricGate for CountingGate {
    async fn authenticate(&self, purpose: GatePurpose, cipher: PreparedCipher) -> GateOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.purposes.lock().unwrap().push(purpose);
        match self.mode {
            Mode::Allow => GateOutcome::Authenticated(self.authority.attest(cipher)),
            Mode::Deny => GateOutcome::denied("user cancelled"),
            Mode::Fail => GateOutcome::error("sensor unavailable"),
        }
    }
}

/// Blob store whose writes always fail, wrapping a working store for reads.
struct ReadOnlyBlobs(FileBlobStore);

impl BlobStore for ReadOnlyBlobs {
    fn read(&self, name: &str) -> nexus_vault::Result<Option<Vec<u8>>> {
        self.0.read(name)
    }

    fn write(&self, _name: &str, _bytes: &[u8]) -> nexus_vault::Result<()> {
        Err(VaultError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn remove(&self, name: &str) -> nexus_vault::Result<bool> {
        self.0.remove(name)
    }

    fn exists(&self, name: &str) -> nexus_vault::Result<bool> {
        self.0.exists(name)
    }
}

/// In-memory blob store for tests that write many envelopes.
#[derive(Default)]
struct MemoryBlobs(std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>);

impl BlobStore for MemoryBlobs {
    fn read(&self, name: &str) -> nexus_vault::Result<Option<Vec<u8>>> {
        Ok(self.0.lock().unwrap().get(name).cloned())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> nexus_vault::Result<()> {
        self.0.lock().unwrap().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> nexus_vault::Result<bool> {
        Ok(self.0.lock().unwrap().remove(name).is_some())
    }

    fn exists(&self, name: &str) -> nexus_vault::Result<bool> {
        Ok(self.0.lock().unwrap().contains_key(name))
    }
}

struct Harness {
    dir: tempfile::TempDir,
    keystore: Arc<SoftwareKeyStore>,
    gate: Arc<CountingGate>,
    vault: Vault,
}

impl Harness {
    fn new(mode: Mode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Arc::new(SoftwareKeyStore::in_memory().unwrap());
        Self::with_keystore(dir, keystore, mode)
    }

    fn with_keystore(dir: tempfile::TempDir, keystore: Arc<SoftwareKeyStore>, mode: Mode) -> Self {
        let gate = Arc::new(CountingGate::new(keystore.presence_authority(), mode));
        let blobs = Arc::new(FileBlobStore::open(dir.path()).unwrap());
        let vault = Vault::new(
            keystore.clone(),
            blobs,
            gate.clone(),
            StorageLayout::default(),
        )
        .unwrap();
        Self {
            dir,
            keystore,
            gate,
            vault,
        }
    }

    fn envelope_path(&self, tier: ProtectionTier) -> std::path::PathBuf {
        self.dir
            .path()
            .join(self.vault.layout().envelope_name(tier))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Round trips
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn roundtrip_both_tiers() {
    let h = Harness::new(Mode::Allow);
    let blobs: [&[u8]; 3] = [b"", b"seed phrase and device keys", &[0xFF; 4096]];

    for tier in ProtectionTier::ALL {
        for blob in blobs {
            h.vault.store(tier, blob).await.unwrap();
            let got = h.vault.retrieve(tier).await.unwrap();
            assert_eq!(got.as_deref(), Some(blob), "tier {tier}");
        }
    }
}

#[tokio::test]
async fn biometric_prompts_once_per_operation() {
    let h = Harness::new(Mode::Allow);

    h.vault.store_biometric(b"bio").await.unwrap();
    assert_eq!(h.gate.calls(), 1);
    h.vault.retrieve_biometric().await.unwrap();
    assert_eq!(h.gate.calls(), 2);
    assert_eq!(
        *h.gate.purposes.lock().unwrap(),
        vec![GatePurpose::Encrypt, GatePurpose::Decrypt]
    );

    // The standard tier never prompts.
    h.vault.store_standard(b"std").unwrap();
    h.vault.retrieve_standard().unwrap();
    assert_eq!(h.gate.calls(), 2);
}

#[tokio::test]
async fn envelope_layout_on_disk() {
    let h = Harness::new(Mode::Allow);
    let identity = b"opaque identity bytes";
    h.vault.store_standard(identity).unwrap();

    let raw = std::fs::read(h.envelope_path(ProtectionTier::Standard)).unwrap();
    assert_eq!(raw.len(), 12 + identity.len() + 16);
    assert!(!raw.windows(identity.len()).any(|w| w == identity));
}

// ═══════════════════════════════════════════════════════════════════════
//  Nonces
// ═══════════════════════════════════════════════════════════════════════

fn distinct_nonces(count: usize) {
    let keystore = Arc::new(SoftwareKeyStore::in_memory().unwrap());
    let gate = Arc::new(CountingGate::new(keystore.presence_authority(), Mode::Allow));
    let blobs = Arc::new(MemoryBlobs::default());
    let layout = StorageLayout::default();
    let vault = Vault::new(keystore, blobs.clone(), gate, layout.clone()).unwrap();
    let name = layout.envelope_name(ProtectionTier::Standard);
    let mut seen = HashSet::with_capacity(count);

    for _ in 0..count {
        vault.store_standard(b"same plaintext").unwrap();
        let raw = blobs.read(name).unwrap().unwrap();
        let envelope = Envelope::from_bytes(raw).unwrap();
        assert!(seen.insert(envelope.nonce()), "nonce reused");
    }
}

#[test]
fn nonces_distinct_across_stores() {
    distinct_nonces(100_000);
}

#[test]
#[ignore = "slow: one million seals"]
fn nonces_distinct_across_a_million_stores() {
    distinct_nonces(1_000_000);
}

// ═══════════════════════════════════════════════════════════════════════
//  Integrity
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn tampered_envelope_is_rejected() {
    let h = Harness::new(Mode::Allow);
    h.vault.store_standard(b"do not tamper").unwrap();
    let path = h.envelope_path(ProtectionTier::Standard);
    let original = std::fs::read(&path).unwrap();

    // One flip in the nonce, the ciphertext and the tag.
    for index in [0, 12, original.len() - 1] {
        let mut tampered = original.clone();
        tampered[index] ^= 0x01;
        std::fs::write(&path, &tampered).unwrap();

        let err = h.vault.retrieve_standard().unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationTag), "index {index}");
        assert_eq!(err.kind(), ErrorKind::AuthenticationTag);
    }
}

#[test]
fn truncated_envelope_is_malformed() {
    let h = Harness::new(Mode::Allow);
    std::fs::write(h.envelope_path(ProtectionTier::Standard), [7u8; 27]).unwrap();

    let err = h.vault.retrieve_standard().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedEnvelope);
}

#[tokio::test]
async fn tiers_are_cryptographically_isolated() {
    let h = Harness::new(Mode::Allow);
    h.vault.store_standard(b"standard").unwrap();
    h.vault.store_biometric(b"biometric").await.unwrap();

    let standard = std::fs::read(h.envelope_path(ProtectionTier::Standard)).unwrap();
    let biometric = std::fs::read(h.envelope_path(ProtectionTier::Biometric)).unwrap();

    // Standard envelope placed in the biometric slot.
    std::fs::write(h.envelope_path(ProtectionTier::Biometric), &standard).unwrap();
    let err = h.vault.retrieve_biometric().await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationTag));

    // Biometric envelope placed in the standard slot.
    std::fs::write(h.envelope_path(ProtectionTier::Standard), &biometric).unwrap();
    let err = h.vault.retrieve_standard().unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationTag));
}

// ═══════════════════════════════════════════════════════════════════════
//  Key provisioning
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn provisioning_is_idempotent() {
    let h = Harness::new(Mode::Allow);
    h.vault.store_standard(b"one").unwrap();
    h.vault.store_biometric(b"two").await.unwrap();

    // Later stores reuse the keys, so earlier envelopes stay readable
    // through any number of provisioning calls.
    for _ in 0..5 {
        h.vault
            .key_provider()
            .get_or_create_key(ProtectionTier::Standard)
            .unwrap();
        h.vault
            .key_provider()
            .get_or_create_key(ProtectionTier::Biometric)
            .unwrap();
    }
    assert_eq!(h.vault.retrieve_standard().unwrap().as_deref(), Some(&b"one"[..]));
    assert_eq!(
        h.vault.retrieve_biometric().await.unwrap().as_deref(),
        Some(&b"two"[..])
    );
}

#[test]
fn biometric_key_refuses_use_without_presence() {
    let h = Harness::new(Mode::Allow);
    let handle = h
        .vault
        .key_provider()
        .get_or_create_key(ProtectionTier::Biometric)
        .unwrap();

    let err = h
        .keystore
        .seal(handle.alias(), &[0u8; 12], b"x", None)
        .unwrap_err();
    assert!(matches!(err, VaultError::PresenceRequired { .. }));
    assert_eq!(err.kind(), ErrorKind::KeyStore);
}

// ═══════════════════════════════════════════════════════════════════════
//  Biometric gate
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn absent_biometric_record_never_prompts() {
    let h = Harness::new(Mode::Allow);

    assert_eq!(h.vault.retrieve_biometric().await.unwrap(), None);
    assert_eq!(h.gate.calls(), 0);
    assert!(
        !h.vault
            .key_provider()
            .has_key(ProtectionTier::Biometric)
            .unwrap()
    );
}

#[tokio::test]
async fn denied_store_leaves_no_record() {
    let h = Harness::new(Mode::Deny);

    let err = h.vault.store_biometric(b"bio").await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationDenied { .. }));
    assert!(err.is_retriable());
    assert_eq!(h.gate.calls(), 1);
    assert!(!h.envelope_path(ProtectionTier::Biometric).exists());
    assert_eq!(
        h.vault.state(ProtectionTier::Biometric).unwrap(),
        TierState::Empty
    );
}

#[tokio::test]
async fn denied_retrieve_keeps_record() {
    let dir = tempfile::tempdir().unwrap();
    let keystore = Arc::new(SoftwareKeyStore::in_memory().unwrap());

    let writer = Harness::with_keystore(dir, keystore.clone(), Mode::Allow);
    writer.vault.store_biometric(b"bio").await.unwrap();
    let dir = writer.dir;

    let reader = Harness::with_keystore(dir, keystore, Mode::Deny);
    let err = reader.vault.retrieve_biometric().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationDenied);
    assert_eq!(
        reader.vault.state(ProtectionTier::Biometric).unwrap(),
        TierState::Stored
    );
}

#[tokio::test]
async fn gate_error_is_distinct_from_denial() {
    let h = Harness::new(Mode::Fail);

    let err = h.vault.store_biometric(b"bio").await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(err.is_retriable());
    assert!(!h.envelope_path(ProtectionTier::Biometric).exists());
}

// ═══════════════════════════════════════════════════════════════════════
//  Wipe
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn wipe_scenario() {
    let h = Harness::new(Mode::Allow);
    h.vault.store_standard(b"standard").unwrap();
    h.vault.store_biometric(b"biometric").await.unwrap();
    h.vault.store_metadata(r#"{"created":"2024-01-01"}"#).unwrap();
    let old_standard = std::fs::read(h.envelope_path(ProtectionTier::Standard)).unwrap();

    h.vault.wipe().unwrap();

    assert_eq!(h.vault.retrieve_standard().unwrap(), None);
    assert!(
        !h.vault
            .key_provider()
            .has_key(ProtectionTier::Standard)
            .unwrap()
    );
    assert_eq!(
        h.vault.retrieve_biometric().await.unwrap().as_deref(),
        Some(&b"biometric"[..])
    );
    assert_eq!(
        h.vault.get_metadata().unwrap().as_deref(),
        Some(r#"{"created":"2024-01-01"}"#)
    );

    // The standard tier is usable again under a newly generated key.
    h.vault.store_standard(b"fresh").unwrap();
    assert_eq!(
        h.vault.retrieve_standard().unwrap().as_deref(),
        Some(&b"fresh"[..])
    );
    assert!(
        h.vault
            .key_provider()
            .has_key(ProtectionTier::Standard)
            .unwrap()
    );
    assert_eq!(
        h.vault.retrieve_biometric().await.unwrap().as_deref(),
        Some(&b"biometric"[..])
    );

    // A restored copy of the old envelope is unrecoverable: the key is gone
    // and a fresh one is provisioned on the next retrieve.
    std::fs::write(h.envelope_path(ProtectionTier::Standard), &old_standard).unwrap();
    let err = h.vault.retrieve_standard().unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationTag));
}

#[test]
fn wipe_on_empty_vault_succeeds() {
    let h = Harness::new(Mode::Allow);
    h.vault.wipe().unwrap();
    h.vault.wipe_biometric().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════
//  Metadata
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn metadata_is_independent_of_keys_and_gate() {
    let h = Harness::new(Mode::Deny);
    let json = r#"{ "name": "laptop", "tiers": ["standard"] }"#;

    assert_eq!(h.vault.get_metadata().unwrap(), None);
    h.vault.store_metadata(json).unwrap();
    assert_eq!(h.vault.get_metadata().unwrap().as_deref(), Some(json));

    assert_eq!(h.gate.calls(), 0);
    assert!(!h.keystore.contains_alias("nexus_master_key").unwrap());
    assert!(!h.keystore.contains_alias("nexus_biometric_key").unwrap());
}

#[test]
fn metadata_rejects_malformed_json() {
    let h = Harness::new(Mode::Allow);
    let err = h.vault.store_metadata("{\"unterminated\": ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(h.vault.get_metadata().unwrap(), None);
}

// ═══════════════════════════════════════════════════════════════════════
//  Failure atomicity
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn failed_write_keeps_previous_record() {
    let dir = tempfile::tempdir().unwrap();
    let keystore = Arc::new(SoftwareKeyStore::in_memory().unwrap());

    let writer = Harness::with_keystore(dir, keystore.clone(), Mode::Allow);
    writer.vault.store_standard(b"previous").unwrap();
    let dir = writer.dir;

    let gate = Arc::new(CountingGate::new(keystore.presence_authority(), Mode::Allow));
    let blobs = Arc::new(ReadOnlyBlobs(FileBlobStore::open(dir.path()).unwrap()));
    let vault = Vault::new(keystore, blobs, gate, StorageLayout::default()).unwrap();

    let err = vault.store_standard(b"replacement").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(
        vault.retrieve_standard().unwrap().as_deref(),
        Some(&b"previous"[..])
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Persistence
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key_dir = dir.path().join("keys");

    {
        let keystore = Arc::new(SoftwareKeyStore::open(&key_dir).unwrap());
        let gate = Arc::new(CountingGate::new(keystore.presence_authority(), Mode::Allow));
        let blobs = Arc::new(FileBlobStore::open(dir.path()).unwrap());
        let vault = Vault::new(keystore, blobs, gate, StorageLayout::default()).unwrap();
        vault.store_standard(b"persisted").unwrap();
        vault.store_biometric(b"persisted bio").await.unwrap();
    }

    let keystore = Arc::new(SoftwareKeyStore::open(&key_dir).unwrap());
    let gate = Arc::new(CountingGate::new(keystore.presence_authority(), Mode::Allow));
    let blobs = Arc::new(FileBlobStore::open(dir.path()).unwrap());
    let vault = Vault::new(keystore, blobs, gate, StorageLayout::default()).unwrap();

    assert_eq!(
        vault.retrieve_standard().unwrap().as_deref(),
        Some(&b"persisted"[..])
    );
    assert_eq!(
        vault.retrieve_biometric().await.unwrap().as_deref(),
        Some(&b"persisted bio"[..])
    );
    let status = vault.status().unwrap();
    assert!(status.standard.has_key && status.biometric.has_key);
}
