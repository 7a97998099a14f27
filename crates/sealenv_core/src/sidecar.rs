//! Sidecar metadata files.
//!
//! Every encrypted data file has a companion file at `<data path><suffix>`
//! holding one fixed-size metadata record per data block:
//!
//! ```text
//! offset 0            m            2m           3m
//!        ├────────────┼────────────┼────────────┼──
//!        │ record 0   │ record 1   │ record 2   │ ...
//! ```
//!
//! The file has no header and no checksum. Records are addressed directly by
//! `block_index * metadata_size`, so blocks can be touched in any order.
//! A record past the end of the file, or cut short by a crash, reads back
//! zero-padded.

use crate::error::{EnvError, EnvResult};
use crate::file::RandomAccessFile;
use crate::fs::FileSystem;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Returns the sidecar path for a data file: the data path with `suffix` appended.
#[must_use]
pub fn sidecar_path(primary: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(primary.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// The metadata channel for one data file.
///
/// Owns its sidecar file handle exclusively. Each record read or write is a
/// single positioned call on the handle, so concurrent calls for different
/// blocks never observe each other's file cursor.
///
/// The handle is flushed when the channel is closed or dropped.
pub struct SidecarChannel {
    path: PathBuf,
    file: Arc<dyn RandomAccessFile>,
    metadata_size: usize,
    sync_on_close: bool,
    closed: bool,
}

impl SidecarChannel {
    /// Opens the sidecar of `primary`, creating an empty one if absent.
    ///
    /// Existing records are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar file cannot be opened or created.
    pub fn open(
        fs: &dyn FileSystem,
        primary: &Path,
        suffix: &str,
        metadata_size: usize,
    ) -> EnvResult<Self> {
        let path = sidecar_path(primary, suffix);
        let file = fs.open(&path)?;
        debug!(path = %path.display(), metadata_size, "opened sidecar");

        Ok(Self {
            path,
            file,
            metadata_size,
            sync_on_close: false,
            closed: false,
        })
    }

    /// Sets whether closing the channel syncs the sidecar instead of flushing it.
    #[must_use]
    pub fn with_sync_on_close(mut self, value: bool) -> Self {
        self.sync_on_close = value;
        self
    }

    /// Returns the sidecar path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the record size in bytes.
    #[must_use]
    pub fn metadata_size(&self) -> usize {
        self.metadata_size
    }

    /// Reads the record for `block_index` into `out`.
    ///
    /// Bytes the sidecar does not hold are zero-filled, so a block that was
    /// never written yields an all-zero record.
    ///
    /// # Errors
    ///
    /// Returns an error if `out` is not `metadata_size` bytes, the record
    /// offset overflows, or the read fails.
    pub fn read_metadata(&self, block_index: u64, out: &mut [u8]) -> EnvResult<()> {
        self.check_len(out.len())?;
        let offset = self.record_offset(block_index)?;

        let read = self.file.read_at(offset, out)?;
        out[read..].fill(0);
        trace!(block_index, read, "read sidecar record");
        Ok(())
    }

    /// Reads the record for `block_index` into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`SidecarChannel::read_metadata`].
    pub fn read_record(&self, block_index: u64) -> EnvResult<Vec<u8>> {
        let mut record = vec![0u8; self.metadata_size];
        self.read_metadata(block_index, &mut record)?;
        Ok(record)
    }

    /// Writes the record for `block_index`, extending the sidecar if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `record` is not `metadata_size` bytes, the record
    /// offset overflows, or the write fails. A partial write is an error and
    /// is not retried.
    pub fn write_metadata(&self, block_index: u64, record: &[u8]) -> EnvResult<()> {
        self.check_len(record.len())?;
        let offset = self.record_offset(block_index)?;

        self.file.write_at(offset, record)?;
        trace!(block_index, "wrote sidecar record");
        Ok(())
    }

    /// Returns the number of complete records the sidecar holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar size cannot be determined.
    pub fn record_count(&self) -> EnvResult<u64> {
        if self.metadata_size == 0 {
            return Ok(0);
        }
        Ok(self.file.size()? / self.metadata_size as u64)
    }

    /// Flushes buffered records to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> EnvResult<()> {
        self.file.flush()
    }

    /// Syncs the sidecar to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> EnvResult<()> {
        self.file.sync()
    }

    /// Flushes (or syncs) and releases the sidecar.
    ///
    /// Dropping the channel does the same but can only log a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails.
    pub fn close(mut self) -> EnvResult<()> {
        self.closed = true;
        self.finish()
    }

    fn finish(&self) -> EnvResult<()> {
        if self.sync_on_close {
            self.file.sync()
        } else {
            self.file.flush()
        }
    }

    fn record_offset(&self, block_index: u64) -> EnvResult<u64> {
        block_index
            .checked_mul(self.metadata_size as u64)
            .ok_or_else(|| {
                EnvError::invalid_argument(format!(
                    "block index {block_index} overflows sidecar offset"
                ))
            })
    }

    fn check_len(&self, len: usize) -> EnvResult<()> {
        if len != self.metadata_size {
            return Err(EnvError::invalid_argument(format!(
                "metadata record is {len} bytes, expected {}",
                self.metadata_size
            )));
        }
        Ok(())
    }
}

impl Drop for SidecarChannel {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.finish() {
            warn!(path = %self.path.display(), error = %e, "sidecar flush on drop failed");
        }
    }
}

impl std::fmt::Debug for SidecarChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarChannel")
            .field("path", &self.path)
            .field("metadata_size", &self.metadata_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemFileSystem;
    use crate::os::OsFileSystem;
    use tempfile::tempdir;

    #[test]
    fn sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/db/000012.sst"), ".meta"),
            PathBuf::from("/db/000012.sst.meta")
        );
        assert_eq!(
            sidecar_path(Path::new("MANIFEST-000001"), ".aead"),
            PathBuf::from("MANIFEST-000001.aead")
        );
    }

    #[test]
    fn new_block_reads_zeros() {
        let fs = MemFileSystem::new();
        let channel = SidecarChannel::open(&fs, Path::new("data"), ".meta", 16).unwrap();

        let mut record = [0xFFu8; 16];
        channel.read_metadata(42, &mut record).unwrap();
        assert_eq!(record, [0u8; 16]);
        assert!(fs.exists(Path::new("data.meta")).unwrap());
    }

    #[test]
    fn records_are_positioned_by_block_index() {
        let fs = MemFileSystem::new();
        let channel = SidecarChannel::open(&fs, Path::new("data"), ".meta", 4).unwrap();

        channel.write_metadata(2, &[1, 2, 3, 4]).unwrap();
        channel.write_metadata(0, &[9, 9, 9, 9]).unwrap();

        let raw = fs.file(Path::new("data.meta")).unwrap().data();
        assert_eq!(raw, vec![9, 9, 9, 9, 0, 0, 0, 0, 1, 2, 3, 4]);

        assert_eq!(channel.read_record(1).unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(channel.read_record(2).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(channel.record_count().unwrap(), 3);
    }

    #[test]
    fn truncated_record_is_zero_padded() {
        let fs = MemFileSystem::new();
        let path = Path::new("data");
        {
            let channel = SidecarChannel::open(&fs, path, ".meta", 8).unwrap();
            channel.write_metadata(1, &[7; 8]).unwrap();
        }

        // Simulate a crash that cut the last record short
        fs.file(Path::new("data.meta")).unwrap().truncate(11).unwrap();

        let channel = SidecarChannel::open(&fs, path, ".meta", 8).unwrap();
        assert_eq!(channel.read_record(1).unwrap(), vec![7, 7, 7, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn wrong_record_length_rejected() {
        let fs = MemFileSystem::new();
        let channel = SidecarChannel::open(&fs, Path::new("data"), ".meta", 4).unwrap();

        assert!(channel.write_metadata(0, &[1, 2, 3]).is_err());
        assert!(channel.read_metadata(0, &mut [0u8; 5]).is_err());
    }

    #[test]
    fn offset_overflow_rejected() {
        let fs = MemFileSystem::new();
        let channel = SidecarChannel::open(&fs, Path::new("data"), ".meta", 16).unwrap();

        let result = channel.read_record(u64::MAX);
        assert!(matches!(result, Err(EnvError::InvalidArgument { .. })));
    }

    #[test]
    fn zero_sized_records() {
        let fs = MemFileSystem::new();
        let channel = SidecarChannel::open(&fs, Path::new("data"), ".meta", 0).unwrap();

        channel.write_metadata(5, &[]).unwrap();
        assert!(channel.read_record(5).unwrap().is_empty());
        assert_eq!(channel.record_count().unwrap(), 0);
    }

    #[test]
    fn records_survive_reopen_on_disk() {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("000007.sst");
        let fs = OsFileSystem::new();

        {
            let channel = SidecarChannel::open(&fs, &primary, ".meta", 16)
                .unwrap()
                .with_sync_on_close(true);
            channel.write_metadata(3, &[0xAB; 16]).unwrap();
            channel.close().unwrap();
        }

        let channel = SidecarChannel::open(&fs, &primary, ".meta", 16).unwrap();
        assert_eq!(channel.read_record(3).unwrap(), vec![0xAB; 16]);
        assert_eq!(channel.read_record(0).unwrap(), vec![0; 16]);
        assert_eq!(channel.path(), dir.path().join("000007.sst.meta"));
    }

    struct FlushFails;

    impl RandomAccessFile for FlushFails {
        fn read_at(&self, _: u64, _: &mut [u8]) -> EnvResult<usize> {
            Ok(0)
        }

        fn write_at(&self, _: u64, _: &[u8]) -> EnvResult<()> {
            Ok(())
        }

        fn size(&self) -> EnvResult<u64> {
            Ok(0)
        }

        fn flush(&self) -> EnvResult<()> {
            Err(std::io::Error::other("device gone").into())
        }

        fn sync(&self) -> EnvResult<()> {
            Err(std::io::Error::other("device gone").into())
        }

        fn truncate(&self, _: u64) -> EnvResult<()> {
            Ok(())
        }
    }

    struct FlushFailsFs;

    impl FileSystem for FlushFailsFs {
        fn name(&self) -> &'static str {
            "FlushFailsFs"
        }

        fn open(&self, _: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
            Ok(Arc::new(FlushFails))
        }

        fn rename(&self, _: &Path, _: &Path) -> EnvResult<()> {
            Ok(())
        }

        fn remove(&self, _: &Path) -> EnvResult<()> {
            Ok(())
        }

        fn exists(&self, _: &Path) -> EnvResult<bool> {
            Ok(true)
        }

        fn create_dir_all(&self, _: &Path) -> EnvResult<()> {
            Ok(())
        }
    }

    /// Records the level of every event dispatched to it.
    struct LevelRecorder(Arc<parking_lot::Mutex<Vec<tracing::Level>>>);

    impl tracing::Subscriber for LevelRecorder {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            self.0.lock().push(*event.metadata().level());
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn explicit_close_reports_flush_failure() {
        let channel = SidecarChannel::open(&FlushFailsFs, Path::new("data"), ".meta", 8).unwrap();
        assert!(matches!(channel.close(), Err(EnvError::Io(_))));
    }

    #[test]
    fn flush_failure_on_drop_logs_warning() {
        let levels = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = LevelRecorder(levels.clone());

        tracing::subscriber::with_default(recorder, || {
            let channel =
                SidecarChannel::open(&FlushFailsFs, Path::new("data"), ".meta", 8).unwrap();
            drop(channel);
        });

        let levels = levels.lock();
        assert_eq!(levels.as_slice(), &[tracing::Level::DEBUG, tracing::Level::WARN]);
    }
}
