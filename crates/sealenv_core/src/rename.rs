//! Keeping sidecar files in step with their data files.
//!
//! [`SidecarFileSystem`] wraps the engine's file system and overrides only
//! `rename` and `remove`. Every other operation is delegated unchanged.
//!
//! The sidecar rename and the data rename are two separate steps. A crash
//! between them leaves the sidecar under the old name, and blocks written
//! before the rename will then fail to decrypt. Renames that bypass this
//! wrapper have the same effect.

use crate::config::EnvConfig;
use crate::error::EnvResult;
use crate::file::RandomAccessFile;
use crate::fs::FileSystem;
use crate::sidecar::sidecar_path;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A file system decorator that mirrors renames (and optionally removals)
/// of data files onto their sidecar files.
pub struct SidecarFileSystem {
    inner: Arc<dyn FileSystem>,
    suffix: String,
    mirror_removals: bool,
}

impl SidecarFileSystem {
    /// Wraps `inner`, naming sidecars with the configured suffix.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvError::InvalidConfig`] if `config` is invalid.
    pub fn new(inner: Arc<dyn FileSystem>, config: &EnvConfig) -> EnvResult<Self> {
        config.validate()?;
        Ok(Self {
            inner,
            suffix: config.sidecar_suffix.clone(),
            mirror_removals: config.mirror_removals,
        })
    }

    /// Returns the wrapped file system.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn FileSystem> {
        &self.inner
    }

    /// Returns the sidecar suffix.
    #[must_use]
    pub fn sidecar_suffix(&self) -> &str {
        &self.suffix
    }
}

impl FileSystem for SidecarFileSystem {
    fn name(&self) -> &'static str {
        "SidecarFileSystem"
    }

    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
        self.inner.open(path)
    }

    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        let src_meta = sidecar_path(src, &self.suffix);
        let dest_meta = sidecar_path(dest, &self.suffix);

        // Best effort: a file that never had an encrypted block has no sidecar.
        match self.inner.rename(&src_meta, &dest_meta) {
            Ok(()) => debug!(
                src = %src_meta.display(),
                dest = %dest_meta.display(),
                "renamed sidecar"
            ),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(
                src = %src_meta.display(),
                dest = %dest_meta.display(),
                error = %e,
                "sidecar rename failed"
            ),
        }

        self.inner.rename(src, dest)
    }

    fn remove(&self, path: &Path) -> EnvResult<()> {
        self.inner.remove(path)?;

        if self.mirror_removals {
            let meta = sidecar_path(path, &self.suffix);
            match self.inner.remove(&meta) {
                Ok(()) => debug!(path = %meta.display(), "removed sidecar"),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(path = %meta.display(), error = %e, "sidecar removal failed"),
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> EnvResult<bool> {
        self.inner.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> EnvResult<()> {
        self.inner.create_dir_all(path)
    }
}

impl std::fmt::Debug for SidecarFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarFileSystem")
            .field("inner", &self.inner.name())
            .field("suffix", &self.suffix)
            .field("mirror_removals", &self.mirror_removals)
            .finish()
    }
}
