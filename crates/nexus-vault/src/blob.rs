//! Named blob persistence.
//!
//! The vault treats persistence as a flat key-value store of byte blobs.
//! [`FileBlobStore`] maps each name to a file in one directory and replaces
//! files atomically: the new content is written to a temporary file beside
//! the target, flushed, and renamed over it. A failed write therefore leaves
//! the previous blob intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::validate_name;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Flat, name-addressed byte storage.
pub trait BlobStore: Send + Sync {
    /// Read a blob. `Ok(None)` if it does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically create or replace a blob.
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a blob. Returns whether it existed.
    fn remove(&self, name: &str) -> Result<bool>;

    fn exists(&self, name: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Filesystem implementation
// ---------------------------------------------------------------------------

/// Blob store backed by files in a single directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open a blob store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "opened file blob store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        write_atomic(&path, bytes)?;
        tracing::debug!(name, len = bytes.len(), "wrote blob");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(name, "removed blob");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        Ok(path.try_exists()?)
    }
}

/// Write `bytes` to `path` via a same-directory temp file and rename.
///
/// The temp file is created with owner-only permissions on Unix and is
/// removed automatically if anything fails before the rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
