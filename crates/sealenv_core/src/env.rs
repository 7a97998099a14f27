//! The encrypted environment handle.
//!
//! An [`Env`] is what a storage engine receives in place of its default
//! file environment. It stacks three layers over a base file system:
//!
//! ```text
//! Env
//!  └─ EncryptedFileSystem      opens files with a cipher stream
//!      └─ SidecarFileSystem    mirrors rename/remove onto sidecars
//!          └─ base FileSystem  OsFileSystem, MemFileSystem, ...
//! ```

use crate::config::EnvConfig;
use crate::descriptor::{CipherDescriptor, SizedBlockCipher};
use crate::encrypted::{EncryptedFile, EncryptedFileSystem};
use crate::error::EnvResult;
use crate::file::RandomAccessFile;
use crate::fs::FileSystem;
use crate::os::OsFileSystem;
use crate::provider::SidecarEncryptionProvider;
use crate::rename::SidecarFileSystem;
use crate::sidecar::sidecar_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// An encrypted storage environment.
///
/// Cheap to clone; clones share the same provider and cipher. The cipher is
/// dropped once the last clone and the last open file are gone.
///
/// # Example
///
/// ```rust
/// use sealenv_core::{BlockCipher, CipherDescriptor, Env, EnvConfig, MemFileSystem, RandomAccessFile};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// struct Xor;
///
/// impl BlockCipher for Xor {
///     fn encrypt_block(&self, _: u64, data: &mut [u8], _: &mut [u8]) -> bool {
///         data.iter_mut().for_each(|b| *b ^= 0x55);
///         true
///     }
///     fn decrypt_block(&self, _: u64, data: &mut [u8], _: &[u8]) -> bool {
///         data.iter_mut().for_each(|b| *b ^= 0x55);
///         true
///     }
/// }
///
/// let descriptor = CipherDescriptor::new(64, 8, Xor).unwrap();
/// let env = Env::encrypted_with(Arc::new(MemFileSystem::new()), descriptor, EnvConfig::default()).unwrap();
///
/// let file = env.open_file(Path::new("000001.log")).unwrap();
/// file.write_at(0, b"hello").unwrap();
/// env.rename_file(Path::new("000001.log"), Path::new("000002.log")).unwrap();
/// ```
#[derive(Clone)]
pub struct Env(Arc<EnvInner>);

struct EnvInner {
    config: EnvConfig,
    provider: Arc<SidecarEncryptionProvider>,
    fs: EncryptedFileSystem,
}

impl Env {
    /// Creates an encrypted environment over the operating system's files.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvError::InvalidConfig`] if `config` is invalid.
    pub fn encrypted(descriptor: CipherDescriptor, config: EnvConfig) -> EnvResult<Self> {
        Self::encrypted_with(Arc::new(OsFileSystem::new()), descriptor, config)
    }

    /// Creates an encrypted environment for a cipher with compile-time sizes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvError::InvalidConfig`] if `config` is invalid or
    /// the cipher's block size is zero.
    pub fn encrypted_sized<C: SizedBlockCipher + 'static>(
        cipher: C,
        config: EnvConfig,
    ) -> EnvResult<Self> {
        Self::encrypted(CipherDescriptor::from_sized(cipher)?, config)
    }

    /// Creates an encrypted environment over an arbitrary base file system.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvError::InvalidConfig`] if `config` is invalid.
    pub fn encrypted_with(
        base: Arc<dyn FileSystem>,
        descriptor: CipherDescriptor,
        config: EnvConfig,
    ) -> EnvResult<Self> {
        config.validate()?;

        debug!(
            base = base.name(),
            block_size = descriptor.block_size(),
            metadata_size = descriptor.metadata_size(),
            suffix = %config.sidecar_suffix,
            "creating encrypted environment"
        );

        let provider = Arc::new(SidecarEncryptionProvider::new(
            descriptor,
            Arc::clone(&base),
            &config,
        )?);
        let sidecars = Arc::new(SidecarFileSystem::new(base, &config)?);
        let fs = EncryptedFileSystem::new(sidecars, provider.clone())
            .with_create_parent_dirs(config.create_parent_dirs);

        Ok(Self(Arc::new(EnvInner {
            config,
            provider,
            fs,
        })))
    }

    /// Opens (or creates) an encrypted file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its sidecar cannot be opened.
    pub fn open_file(&self, path: &Path) -> EnvResult<EncryptedFile> {
        self.0.fs.open_encrypted(path)
    }

    /// Renames a data file together with its sidecar.
    ///
    /// # Errors
    ///
    /// Returns an error if the data file rename fails.
    pub fn rename_file(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        self.0.fs.rename(src, dest)
    }

    /// Removes a data file (and its sidecar, if configured).
    ///
    /// # Errors
    ///
    /// Returns an error if the data file cannot be removed.
    pub fn remove_file(&self, path: &Path) -> EnvResult<()> {
        self.0.fs.remove(path)
    }

    /// Returns whether a data file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    pub fn file_exists(&self, path: &Path) -> EnvResult<bool> {
        self.0.fs.exists(path)
    }

    /// Creates a directory and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn create_dir_all(&self, path: &Path) -> EnvResult<()> {
        self.0.fs.create_dir_all(path)
    }

    /// Returns the sidecar path for a data file.
    #[must_use]
    pub fn sidecar_path(&self, path: &Path) -> PathBuf {
        sidecar_path(path, &self.0.config.sidecar_suffix)
    }

    /// Returns the encryption provider.
    #[must_use]
    pub fn provider(&self) -> &SidecarEncryptionProvider {
        &self.0.provider
    }

    /// Returns the encrypted file system.
    #[must_use]
    pub fn file_system(&self) -> &EncryptedFileSystem {
        &self.0.fs
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EnvConfig {
        &self.0.config
    }

    /// Returns the cipher's block size.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.0.provider.descriptor().block_size()
    }

    /// Returns the cipher's metadata size.
    #[must_use]
    pub fn metadata_size(&self) -> usize {
        self.0.provider.descriptor().metadata_size()
    }
}

impl FileSystem for Env {
    fn name(&self) -> &'static str {
        "EncryptedEnv"
    }

    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
        self.0.fs.open(path)
    }

    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        self.rename_file(src, dest)
    }

    fn remove(&self, path: &Path) -> EnvResult<()> {
        self.remove_file(path)
    }

    fn exists(&self, path: &Path) -> EnvResult<bool> {
        self.file_exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> EnvResult<()> {
        self.0.fs.create_dir_all(path)
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("config", &self.0.config)
            .field("fs", &self.0.fs)
            .finish()
    }
}
