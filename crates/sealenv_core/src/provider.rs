//! Encryption providers: per-file cipher stream factories.

use crate::config::EnvConfig;
use crate::descriptor::CipherDescriptor;
use crate::error::EnvResult;
use crate::fs::FileSystem;
use crate::sidecar::SidecarChannel;
use crate::stream::{BlockAccessCipherStream, BlockCipherStream};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Identity under which [`SidecarEncryptionProvider`] registers itself.
pub const SIDECAR_PROVIDER_NAME: &str = "SidecarEncryptionProvider";

/// A factory the storage engine calls once per opened file.
pub trait EncryptionProvider: Send + Sync {
    /// Stable name used for provider discovery.
    fn name(&self) -> &str;

    /// Length of the plaintext prefix this provider writes at the start of
    /// each file.
    fn prefix_length(&self) -> usize;

    /// Fills in the prefix for a newly created file.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix cannot be produced.
    fn create_new_prefix(&self, path: &Path, prefix: &mut [u8]) -> EnvResult<()>;

    /// Registers an additional cipher under `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher cannot be registered.
    fn add_cipher(&self, descriptor: &str, cipher: &[u8], for_write: bool) -> EnvResult<()>;

    /// Creates the cipher stream for the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream's backing state cannot be opened.
    fn create_cipher_stream(&self, path: &Path) -> EnvResult<Box<dyn BlockAccessCipherStream>>;
}

/// The provider that stores per-block metadata in sidecar files.
///
/// Owns the [`CipherDescriptor`] for the lifetime of the environment and
/// lends it to every stream it creates. The descriptor (and with it the
/// cipher) is dropped once the provider and all of its streams are gone.
///
/// This provider has no file prefix and no cipher registry: all state is
/// per block and lives in the sidecar.
pub struct SidecarEncryptionProvider {
    descriptor: Arc<CipherDescriptor>,
    fs: Arc<dyn FileSystem>,
    suffix: String,
    sync_on_close: bool,
}

impl SidecarEncryptionProvider {
    /// Creates a provider whose sidecars are opened through `fs`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvError::InvalidConfig`] if `config` is invalid.
    pub fn new(
        descriptor: CipherDescriptor,
        fs: Arc<dyn FileSystem>,
        config: &EnvConfig,
    ) -> EnvResult<Self> {
        config.validate()?;
        Ok(Self {
            descriptor: Arc::new(descriptor),
            fs,
            suffix: config.sidecar_suffix.clone(),
            sync_on_close: config.sync_sidecar_on_close,
        })
    }

    /// Returns the shared descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<CipherDescriptor> {
        &self.descriptor
    }

    /// Returns the sidecar suffix.
    #[must_use]
    pub fn sidecar_suffix(&self) -> &str {
        &self.suffix
    }

    /// Creates the concrete sidecar-backed stream for `path`.
    ///
    /// The sidecar is created empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the sidecar cannot be opened or created.
    pub fn create_block_stream(&self, path: &Path) -> EnvResult<BlockCipherStream> {
        let sidecar = SidecarChannel::open(
            self.fs.as_ref(),
            path,
            &self.suffix,
            self.descriptor.metadata_size(),
        )?
        .with_sync_on_close(self.sync_on_close);

        debug!(path = %path.display(), "created cipher stream");
        BlockCipherStream::new(Arc::clone(&self.descriptor), sidecar)
    }
}

impl EncryptionProvider for SidecarEncryptionProvider {
    fn name(&self) -> &str {
        SIDECAR_PROVIDER_NAME
    }

    fn prefix_length(&self) -> usize {
        0
    }

    fn create_new_prefix(&self, _path: &Path, _prefix: &mut [u8]) -> EnvResult<()> {
        Ok(())
    }

    fn add_cipher(&self, _descriptor: &str, _cipher: &[u8], _for_write: bool) -> EnvResult<()> {
        Ok(())
    }

    fn create_cipher_stream(&self, path: &Path) -> EnvResult<Box<dyn BlockAccessCipherStream>> {
        Ok(Box::new(self.create_block_stream(path)?))
    }
}

impl Drop for SidecarEncryptionProvider {
    fn drop(&mut self) {
        let outstanding = Arc::strong_count(&self.descriptor) - 1;
        if outstanding > 0 {
            debug!(outstanding, "provider dropped with open streams; cipher teardown deferred");
        }
    }
}

impl std::fmt::Debug for SidecarEncryptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarEncryptionProvider")
            .field("descriptor", &self.descriptor)
            .field("fs", &self.fs.name())
            .field("suffix", &self.suffix)
            .finish()
    }
}
