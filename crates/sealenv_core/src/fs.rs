//! File system trait definition.

use crate::error::EnvResult;
use crate::file::RandomAccessFile;
use std::path::Path;
use std::sync::Arc;

/// The file-system capability a storage engine uses to manage its files.
///
/// Wrappers compose over an `Arc<dyn FileSystem>` and override only the
/// operations they care about, delegating the rest.
///
/// # Implementors
///
/// - [`super::OsFileSystem`] - `std::fs`
/// - [`super::MemFileSystem`] - In-memory, for tests
/// - [`super::SidecarFileSystem`] - Keeps sidecar files in step on rename/remove
/// - [`super::EncryptedFileSystem`] - Opens files with transparent encryption
pub trait FileSystem: Send + Sync {
    /// Stable name of this file system, for diagnostics.
    fn name(&self) -> &'static str;

    /// Opens a file for reading and writing, creating it if absent.
    ///
    /// Existing contents are never truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>>;

    /// Renames `src` to `dest`, replacing `dest` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `src` does not exist or the rename fails.
    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()>;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be removed.
    fn remove(&self, path: &Path) -> EnvResult<()>;

    /// Returns whether a file exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    fn exists(&self, path: &Path) -> EnvResult<bool>;

    /// Creates a directory and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> EnvResult<()>;
}
