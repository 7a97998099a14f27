//! Random-access file trait definition.

use crate::error::{EnvError, EnvResult};

/// A positioned-I/O file handle.
///
/// Handles are shared across threads (`Arc<dyn RandomAccessFile>`), so every
/// method takes `&self` and implementations lock internally. A single call
/// is atomic with respect to other calls on the same handle.
///
/// # Invariants
///
/// - `read_at` returns fewer bytes than requested only at end of file
/// - `write_at` extends the file as needed; any gap reads back as zeros
/// - `flush` hands buffered data to the OS, `sync` makes it durable
///
/// # Implementors
///
/// - [`super::OsFile`] - Operating system files
/// - [`super::MemFile`] - For testing and ephemeral environments
/// - [`super::EncryptedFile`] - Transparent block encryption over another file
pub trait RandomAccessFile: Send + Sync {
    /// Reads into `buf` starting at `offset`.
    ///
    /// Returns the number of bytes read, which is short only when the end
    /// of the file is reached (zero if `offset` is at or past the end).
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> EnvResult<usize>;

    /// Writes all of `data` starting at `offset`, extending the file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be completed. A short write is
    /// reported as an error; there is no retry.
    fn write_at(&self, offset: u64, data: &[u8]) -> EnvResult<()>;

    /// Returns the current size of the file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> EnvResult<u64>;

    /// Flushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> EnvResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> EnvResult<()>;

    /// Sets the file length, discarding or zero-extending as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails.
    fn truncate(&self, new_size: u64) -> EnvResult<()>;

    /// Reads exactly `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::ReadPastEnd`] if the file ends before `offset + len`.
    fn read_exact_at(&self, offset: u64, len: usize) -> EnvResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let read = self.read_at(offset, &mut buf)?;
        if read != len {
            return Err(EnvError::ReadPastEnd {
                offset,
                len,
                size: self.size()?,
            });
        }
        Ok(buf)
    }
}
