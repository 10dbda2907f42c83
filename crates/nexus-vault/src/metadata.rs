//! Plaintext metadata document.
//!
//! Metadata is stored as-is, unencrypted and unauthenticated, under one fixed
//! blob name shared by both tiers. Callers must not put secrets in it. The
//! store checks that the text is well-formed JSON and otherwise never looks
//! inside it, so the returned text is byte-for-byte what was stored.

use std::sync::Arc;

use serde::de::IgnoredAny;

use crate::blob::BlobStore;
use crate::error::{Result, VaultError};

pub struct MetadataStore {
    blobs: Arc<dyn BlobStore>,
    name: String,
}

impl MetadataStore {
    pub fn new(blobs: Arc<dyn BlobStore>, name: impl Into<String>) -> Self {
        Self {
            blobs,
            name: name.into(),
        }
    }

    /// Replace the metadata document.
    ///
    /// Returns [`VaultError::InvalidArgument`] (and writes nothing) if `json`
    /// is not a well-formed JSON document.
    pub fn store(&self, json: &str) -> Result<()> {
        serde_json::from_str::<IgnoredAny>(json)
            .map_err(|e| VaultError::invalid(format!("metadata is not valid JSON: {e}")))?;
        self.blobs.write(&self.name, json.as_bytes())?;
        tracing::info!(len = json.len(), "stored metadata");
        Ok(())
    }

    /// The stored document, or `None` if none was ever stored.
    pub fn get(&self) -> Result<Option<String>> {
        let Some(bytes) = self.blobs.read(&self.name)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            VaultError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(Some(text))
    }

    pub fn exists(&self) -> Result<bool> {
        self.blobs.exists(&self.name)
    }
}
