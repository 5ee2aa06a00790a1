//! Durable backing for the single, fixed-name index resource.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tempfile::NamedTempFile;

/// Byte-level storage for the index. `write` must replace the previous value
/// atomically: readers observe either the old bytes or the new bytes.
pub trait IndexStorage: Send + Sync {
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// `Ok(None)` when nothing has been written yet.
    fn read(&self) -> io::Result<Option<Vec<u8>>>;

    /// Human-readable location for logs and status.
    fn describe(&self) -> String;
}

/// Index stored in a single file, replaced via temp file + rename.
#[derive(Debug, Clone)]
pub struct FileIndexStorage {
    path: PathBuf,
}

impl FileIndexStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

impl IndexStorage for FileIndexStorage {
    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        // Same directory as the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Process-local storage, mainly for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryIndexStorage {
    slot: RwLock<Option<Arc<[u8]>>>,
}

impl MemoryIndexStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStorage for MemoryIndexStorage {
    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let value: Arc<[u8]> = Arc::from(bytes);
        *self.slot.write() = Some(value);
        Ok(())
    }

    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.slot.read().as_ref().map(|b| b.to_vec()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
