//! Fault injection for file system operations.
//!
//! [`FaultyFileSystem`] wraps another file system and fails chosen
//! operations on chosen paths, for exercising the partial-failure paths of
//! sidecar renames and removals.
//!
//! ## Usage
//!
//! ```rust
//! use sealenv_core::{FileSystem, MemFileSystem};
//! use sealenv_testkit::faults::{FaultKind, FaultyFileSystem};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let fs = FaultyFileSystem::new(Arc::new(MemFileSystem::new()));
//! fs.inject(FaultKind::Rename, "a.meta");
//! fs.open(Path::new("a.meta")).unwrap();
//! assert!(fs.rename(Path::new("a.meta"), Path::new("b.meta")).is_err());
//! ```

use parking_lot::Mutex;
use sealenv_core::{EnvResult, FileSystem, RandomAccessFile};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// `open` fails.
    Open,
    /// `rename` with this path as source fails.
    Rename,
    /// `remove` fails.
    Remove,
}

#[derive(Debug, Clone)]
struct Fault {
    kind: FaultKind,
    path: PathBuf,
}

/// A file system that fails injected operations with `PermissionDenied`.
pub struct FaultyFileSystem {
    inner: Arc<dyn FileSystem>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<(FaultKind, PathBuf)>>,
}

impl FaultyFileSystem {
    /// Wraps `inner` with no faults injected.
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes `kind` fail for `path` until [`FaultyFileSystem::clear`].
    pub fn inject(&self, kind: FaultKind, path: impl Into<PathBuf>) {
        self.faults.lock().push(Fault {
            kind,
            path: path.into(),
        });
    }

    /// Removes every injected fault.
    pub fn clear(&self) {
        self.faults.lock().clear();
    }

    /// Returns every intercepted call, in order.
    pub fn calls(&self) -> Vec<(FaultKind, PathBuf)> {
        self.calls.lock().clone()
    }

    fn check(&self, kind: FaultKind, path: &Path) -> EnvResult<()> {
        self.calls.lock().push((kind, path.to_path_buf()));
        let hit = self
            .faults
            .lock()
            .iter()
            .any(|f| f.kind == kind && f.path == path);
        if hit {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected {kind:?} fault on {}", path.display()),
            )
            .into());
        }
        Ok(())
    }
}

impl FileSystem for FaultyFileSystem {
    fn name(&self) -> &'static str {
        "FaultyFileSystem"
    }

    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
        self.check(FaultKind::Open, path)?;
        self.inner.open(path)
    }

    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        self.check(FaultKind::Rename, src)?;
        self.inner.rename(src, dest)
    }

    fn remove(&self, path: &Path) -> EnvResult<()> {
        self.check(FaultKind::Remove, path)?;
        self.inner.remove(path)
    }

    fn exists(&self, path: &Path) -> EnvResult<bool> {
        self.inner.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> EnvResult<()> {
        self.inner.create_dir_all(path)
    }
}
