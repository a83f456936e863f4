//! Durable key/value backends for the [`LocalStore`](super::LocalStore).
//!
//! Backends are synchronous string-keyed blob stores. They may fail at any
//! time; the local store above them decides how to degrade.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::StoreError;

/// A durable string-keyed blob store.
///
/// Implementations include:
/// - [`MemoryBackend`]: ephemeral, shareable between handles, can be put
///   into a failing mode for testing
/// - [`FileBackend`]: one JSON file per key under a directory
pub trait StorageBackend: Send + Sync {
    /// Read the blob stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the medium rejects the write.
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete the blob stored under `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the medium rejects the removal.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    blobs: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

/// In-memory backend. Clones share the same blobs, which lets a test
/// "restart" a store over the data a previous instance wrote.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryBackend {
    /// Create a new, empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (simulates storage-disabled contexts).
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Return the raw blob under `key`, bypassing the failure switch.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.blobs.lock().get(key).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory backend disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.inner.blobs.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner
            .blobs
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.blobs.lock().remove(key);
        Ok(())
    }
}

/// File-per-key backend rooted at a directory.
///
/// The directory is created on first write. Writes go to a temporary file
/// that is renamed over the target, so a crash never leaves a torn blob.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. Nothing is touched until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailed(format!("{key}: {e}"))),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StoreError::Unavailable(format!("{}: {e}", self.dir.display()))
        })?;
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, value)
            .and_then(|()| std::fs::rename(&tmp, &target))
            .map_err(|e| StoreError::WriteFailed(format!("{key}: {e}")))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteFailed(format!("{key}: {e}"))),
        }
    }
}
