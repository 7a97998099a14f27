//! OS-backed files and file system.

use crate::error::EnvResult;
use crate::file::RandomAccessFile;
use crate::fs::FileSystem;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file opened through the operating system.
///
/// Every positioned read or write takes the internal lock for the whole
/// `(seek, read|write)` sequence, so threads sharing one handle never race
/// on the file cursor.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Example
///
/// ```no_run
/// use sealenv_core::{OsFile, RandomAccessFile};
/// use std::path::Path;
///
/// let file = OsFile::open(Path::new("data.bin")).unwrap();
/// file.write_at(0, b"persistent data").unwrap();
/// file.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct OsFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl OsFile {
    /// Opens or creates a file at the given path.
    ///
    /// Existing contents are preserved; the file is never truncated on open.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> EnvResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Opens or creates a file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> EnvResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RandomAccessFile for OsFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> EnvResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filled)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> EnvResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn size(&self) -> EnvResult<u64> {
        let file = self.file.lock();
        Ok(file.metadata()?.len())
    }

    fn flush(&self) -> EnvResult<()> {
        let mut file = self.file.lock();
        file.flush()?;
        Ok(())
    }

    fn sync(&self) -> EnvResult<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&self, new_size: u64) -> EnvResult<()> {
        let file = self.file.lock();
        file.set_len(new_size)?;
        Ok(())
    }
}

/// The default file system, backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl OsFileSystem {
    /// Creates the OS file system handle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn name(&self) -> &'static str {
        "OsFileSystem"
    }

    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
        Ok(Arc::new(OsFile::open(path)?))
    }

    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        fs::rename(src, dest)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> EnvResult<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> EnvResult<bool> {
        Ok(path.try_exists()?)
    }

    fn create_dir_all(&self, path: &Path) -> EnvResult<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let file = OsFile::open(&path).unwrap();
        assert_eq!(file.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let file = OsFile::open(&path).unwrap();
        file.write_at(0, b"hello").unwrap();
        file.write_at(5, b" world").unwrap();
        assert_eq!(file.size().unwrap(), 11);

        let mut buf = [0u8; 11];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn file_short_read_at_eof() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let file = OsFile::open(&path).unwrap();
        file.write_at(0, b"hello").unwrap();

        let mut buf = [0xFFu8; 8];
        assert_eq!(file.read_at(3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(file.read_at(100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn file_write_past_end_zero_fills_gap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let file = OsFile::open(&path).unwrap();
        file.write_at(4, b"xy").unwrap();
        assert_eq!(file.size().unwrap(), 6);

        let mut buf = [0xFFu8; 6];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        {
            let file = OsFile::open(&path).unwrap();
            file.write_at(0, b"persistent data").unwrap();
            file.sync().unwrap();
        }

        // Reopening must not truncate
        {
            let file = OsFile::open(&path).unwrap();
            assert_eq!(file.size().unwrap(), 15);

            let mut buf = [0u8; 15];
            file.read_at(0, &mut buf).unwrap();
            assert_eq!(&buf, b"persistent data");
        }
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("test.bin");

        let file = OsFile::open_with_create_dirs(&path).unwrap();
        assert_eq!(file.size().unwrap(), 0);
        assert_eq!(file.path(), path);
    }

    #[test]
    fn file_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let file = OsFile::open(&path).unwrap();
        file.write_at(0, b"hello world").unwrap();
        file.truncate(5).unwrap();
        assert_eq!(file.size().unwrap(), 5);
    }

    #[test]
    fn fs_rename_and_remove() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let fs = OsFileSystem::new();

        fs.open(&a).unwrap().write_at(0, b"x").unwrap();
        fs.rename(&a, &b).unwrap();
        assert!(!fs.exists(&a).unwrap());
        assert!(fs.exists(&b).unwrap());

        fs.remove(&b).unwrap();
        assert!(!fs.exists(&b).unwrap());

        let err = fs.remove(&b).unwrap_err();
        assert!(err.is_not_found());
    }
}
