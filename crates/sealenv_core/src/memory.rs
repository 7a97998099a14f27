//! In-memory files and file system for testing.

use crate::error::{EnvError, EnvResult};
use crate::file::RandomAccessFile;
use crate::fs::FileSystem;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An in-memory file.
///
/// This file stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral environments that don't need persistence
///
/// # Example
///
/// ```rust
/// use sealenv_core::{MemFile, RandomAccessFile};
///
/// let file = MemFile::new();
/// file.write_at(0, b"test data").unwrap();
/// assert_eq!(file.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct MemFile {
    data: RwLock<Vec<u8>>,
}

impl MemFile {
    /// Creates a new empty in-memory file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory file with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the file.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl RandomAccessFile for MemFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> EnvResult<usize> {
        let data = self.data.read();
        let size = data.len() as u64;
        if offset >= size {
            return Ok(0);
        }

        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, new_data: &[u8]) -> EnvResult<()> {
        if new_data.is_empty() {
            return Ok(());
        }

        let start = usize::try_from(offset)
            .map_err(|_| EnvError::invalid_argument(format!("offset {offset} out of range")))?;
        let end = start
            .checked_add(new_data.len())
            .ok_or_else(|| EnvError::invalid_argument("write extends past addressable range"))?;

        let mut data = self.data.write();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(new_data);
        Ok(())
    }

    fn size(&self) -> EnvResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn flush(&self) -> EnvResult<()> {
        // In-memory file has no pending writes
        Ok(())
    }

    fn sync(&self) -> EnvResult<()> {
        Ok(())
    }

    fn truncate(&self, new_size: u64) -> EnvResult<()> {
        let new_size = usize::try_from(new_size).map_err(|_| {
            EnvError::invalid_argument(format!("size {new_size} out of range"))
        })?;
        self.data.write().resize(new_size, 0);
        Ok(())
    }
}

/// An in-memory file system.
///
/// Files live in a path-keyed map. Handles returned by [`FileSystem::open`]
/// stay valid across renames and removals, matching POSIX semantics.
#[derive(Debug, Default)]
pub struct MemFileSystem {
    files: RwLock<HashMap<PathBuf, Arc<MemFile>>>,
}

impl MemFileSystem {
    /// Creates an empty in-memory file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the file stored at `path`, if any.
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<Arc<MemFile>> {
        self.files.read().get(path).cloned()
    }

    /// Returns all stored paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl FileSystem for MemFileSystem {
    fn name(&self) -> &'static str {
        "MemFileSystem"
    }

    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
        let mut files = self.files.write();
        let file = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(MemFile::new()))
            .clone();
        Ok(file)
    }

    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        let mut files = self.files.write();
        let file = files.remove(src).ok_or_else(|| EnvError::not_found(src))?;
        files.insert(dest.to_path_buf(), file);
        Ok(())
    }

    fn remove(&self, path: &Path) -> EnvResult<()> {
        self.files
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| EnvError::not_found(path))
    }

    fn exists(&self, path: &Path) -> EnvResult<bool> {
        Ok(self.files.read().contains_key(path))
    }

    fn create_dir_all(&self, _path: &Path) -> EnvResult<()> {
        // Directories are implicit
        Ok(())
    }
}
