//! Encrypted files layered over another file system.
//!
//! [`EncryptedFileSystem`] opens each file together with a cipher stream
//! from its [`EncryptionProvider`]. Reads and writes on the returned
//! [`EncryptedFile`] take plaintext; the wrapped file only ever sees
//! ciphertext.
//!
//! ## On-disk layout
//!
//! ```text
//! data file:    [prefix (provider-defined, may be empty)][ciphertext ...]
//! sidecar file: [record 0][record 1] ...   (see crate::sidecar)
//! ```
//!
//! Ciphertext is exactly as long as the plaintext it replaces, so logical
//! offsets map one-to-one onto physical offsets after the prefix.

use crate::error::{EnvError, EnvResult};
use crate::file::RandomAccessFile;
use crate::fs::FileSystem;
use crate::provider::EncryptionProvider;
use crate::stream::BlockAccessCipherStream;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A file whose contents are transparently encrypted block by block.
pub struct EncryptedFile {
    inner: Arc<dyn RandomAccessFile>,
    stream: Box<dyn BlockAccessCipherStream>,
    prefix_len: u64,
}

impl EncryptedFile {
    /// Wraps `inner`, encrypting through `stream`.
    ///
    /// `prefix_len` bytes at the start of `inner` are reserved for the
    /// provider and hidden from callers.
    #[must_use]
    pub fn new(
        inner: Arc<dyn RandomAccessFile>,
        stream: Box<dyn BlockAccessCipherStream>,
        prefix_len: u64,
    ) -> Self {
        Self {
            inner,
            stream,
            prefix_len,
        }
    }

    /// Returns the cipher stream.
    #[must_use]
    pub fn stream(&self) -> &dyn BlockAccessCipherStream {
        self.stream.as_ref()
    }

    /// Returns the wrapped (ciphertext) file.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn RandomAccessFile> {
        &self.inner
    }

    fn physical(&self, offset: u64) -> EnvResult<u64> {
        offset
            .checked_add(self.prefix_len)
            .ok_or_else(|| EnvError::invalid_argument(format!("offset {offset} out of range")))
    }
}

impl RandomAccessFile for EncryptedFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> EnvResult<usize> {
        let read = self.inner.read_at(self.physical(offset)?, buf)?;
        self.stream.decrypt(offset, &mut buf[..read])?;
        Ok(read)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> EnvResult<()> {
        let mut ciphertext = data.to_vec();
        self.stream.encrypt(offset, &mut ciphertext)?;
        self.inner.write_at(self.physical(offset)?, &ciphertext)
    }

    fn size(&self) -> EnvResult<u64> {
        Ok(self.inner.size()?.saturating_sub(self.prefix_len))
    }

    fn flush(&self) -> EnvResult<()> {
        self.inner.flush()?;
        self.stream.flush_metadata()
    }

    fn sync(&self) -> EnvResult<()> {
        self.inner.sync()?;
        self.stream.sync_metadata()
    }

    fn truncate(&self, new_size: u64) -> EnvResult<()> {
        self.inner.truncate(self.physical(new_size)?)
    }
}

impl std::fmt::Debug for EncryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFile")
            .field("block_size", &self.stream.block_size())
            .field("prefix_len", &self.prefix_len)
            .finish()
    }
}

/// A file system that opens every file through an encryption provider.
///
/// Management operations (rename, remove, ...) go straight to the wrapped
/// file system; wrap a [`crate::SidecarFileSystem`] to keep sidecars in step.
pub struct EncryptedFileSystem {
    inner: Arc<dyn FileSystem>,
    provider: Arc<dyn EncryptionProvider>,
    create_parent_dirs: bool,
}

impl EncryptedFileSystem {
    /// Layers `provider` over `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn FileSystem>, provider: Arc<dyn EncryptionProvider>) -> Self {
        Self {
            inner,
            provider,
            create_parent_dirs: false,
        }
    }

    /// Sets whether opening a file creates missing parent directories.
    #[must_use]
    pub fn with_create_parent_dirs(mut self, value: bool) -> Self {
        self.create_parent_dirs = value;
        self
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn EncryptionProvider> {
        &self.provider
    }

    /// Returns the wrapped file system.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn FileSystem> {
        &self.inner
    }

    /// Opens (or creates) an encrypted file.
    ///
    /// A new, empty file gets the provider's prefix written first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its cipher stream cannot be opened,
    /// or the prefix cannot be written.
    pub fn open_encrypted(&self, path: &Path) -> EnvResult<EncryptedFile> {
        if self.create_parent_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                self.inner.create_dir_all(parent)?;
            }
        }

        let file = self.inner.open(path)?;
        let prefix_len = self.provider.prefix_length();
        if prefix_len > 0 && file.size()? == 0 {
            let mut prefix = vec![0u8; prefix_len];
            self.provider.create_new_prefix(path, &mut prefix)?;
            file.write_at(0, &prefix)?;
        }

        let stream = self.provider.create_cipher_stream(path)?;
        debug!(
            path = %path.display(),
            provider = self.provider.name(),
            "opened encrypted file"
        );
        Ok(EncryptedFile::new(file, stream, prefix_len as u64))
    }
}

impl FileSystem for EncryptedFileSystem {
    fn name(&self) -> &'static str {
        "EncryptedFileSystem"
    }

    fn open(&self, path: &Path) -> EnvResult<Arc<dyn RandomAccessFile>> {
        Ok(Arc::new(self.open_encrypted(path)?))
    }

    fn rename(&self, src: &Path, dest: &Path) -> EnvResult<()> {
        self.inner.rename(src, dest)
    }

    fn remove(&self, path: &Path) -> EnvResult<()> {
        self.inner.remove(path)
    }

    fn exists(&self, path: &Path) -> EnvResult<bool> {
        self.inner.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> EnvResult<()> {
        self.inner.create_dir_all(path)
    }
}

impl std::fmt::Debug for EncryptedFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileSystem")
            .field("inner", &self.inner.name())
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::descriptor::{BlockCipher, CipherDescriptor};
    use crate::memory::MemFileSystem;
    use crate::provider::SidecarEncryptionProvider;

    /// Position-dependent XOR keystream, safe for partial blocks.
    struct Keystream;

    impl Keystream {
        fn apply(block_index: u64, data: &mut [u8]) {
            for (i, byte) in data.iter_mut().enumerate() {
                *byte ^= (block_index as u8).wrapping_mul(31) ^ (i as u8) ^ 0xC3;
            }
        }
    }

    impl BlockCipher for Keystream {
        fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool {
            Self::apply(block_index, data);
            metadata[0] = 1;
            true
        }

        fn decrypt_block(&self, block_index: u64, data: &mut [u8], _: &[u8]) -> bool {
            Self::apply(block_index, data);
            true
        }
    }

    /// Wraps the sidecar provider and adds a fixed four-byte prefix.
    struct Prefixed(SidecarEncryptionProvider);

    impl EncryptionProvider for Prefixed {
        fn name(&self) -> &str {
            "Prefixed"
        }

        fn prefix_length(&self) -> usize {
            4
        }

        fn create_new_prefix(&self, _: &Path, prefix: &mut [u8]) -> EnvResult<()> {
            prefix.copy_from_slice(b"SEAL");
            Ok(())
        }

        fn add_cipher(&self, _: &str, _: &[u8], _: bool) -> EnvResult<()> {
            Ok(())
        }

        fn create_cipher_stream(&self, path: &Path) -> EnvResult<Box<dyn BlockAccessCipherStream>> {
            self.0.create_cipher_stream(path)
        }
    }

    fn sidecar_provider(mem: &Arc<MemFileSystem>) -> SidecarEncryptionProvider {
        let descriptor = CipherDescriptor::new(16, 1, Keystream).unwrap();
        SidecarEncryptionProvider::new(descriptor, mem.clone(), &EnvConfig::default()).unwrap()
    }

    #[test]
    fn plaintext_never_reaches_inner_file() {
        let mem = Arc::new(MemFileSystem::new());
        let fs = EncryptedFileSystem::new(mem.clone(), Arc::new(sidecar_provider(&mem)));

        let file = fs.open(Path::new("log")).unwrap();
        file.write_at(0, b"attack at dawn, bring snacks").unwrap();

        let raw = mem.file(Path::new("log")).unwrap().data();
        assert_eq!(raw.len(), 28);
        assert_ne!(raw.as_slice(), b"attack at dawn, bring snacks");

        let mut buf = vec![0u8; 28];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 28);
        assert_eq!(buf, b"attack at dawn, bring snacks");
    }

    #[test]
    fn appends_in_small_pieces() {
        let mem = Arc::new(MemFileSystem::new());
        let fs = EncryptedFileSystem::new(mem.clone(), Arc::new(sidecar_provider(&mem)));
        let file = fs.open_encrypted(Path::new("wal")).unwrap();

        let mut expected = Vec::new();
        for i in 0..20u8 {
            let piece = [i; 7];
            file.write_at(expected.len() as u64, &piece).unwrap();
            expected.extend_from_slice(&piece);
        }

        assert_eq!(file.size().unwrap(), 140);
        let mut buf = vec![0u8; 50];
        assert_eq!(file.read_at(33, &mut buf).unwrap(), 50);
        assert_eq!(buf, &expected[33..83]);
    }

    #[test]
    fn short_read_at_end() {
        let mem = Arc::new(MemFileSystem::new());
        let fs = EncryptedFileSystem::new(mem.clone(), Arc::new(sidecar_provider(&mem)));
        let file = fs.open_encrypted(Path::new("f")).unwrap();
        file.write_at(0, b"0123456789").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(file.read_at(6, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");
    }

    #[test]
    fn provider_prefix_is_hidden() {
        let mem = Arc::new(MemFileSystem::new());
        let provider = Prefixed(sidecar_provider(&mem));
        let fs = EncryptedFileSystem::new(mem.clone(), Arc::new(provider));

        let file = fs.open_encrypted(Path::new("sst")).unwrap();
        file.write_at(0, b"payload").unwrap();
        assert_eq!(file.size().unwrap(), 7);

        let raw = mem.file(Path::new("sst")).unwrap().data();
        assert_eq!(&raw[..4], b"SEAL");

        // Reopening must not rewrite the prefix
        let file = fs.open_encrypted(Path::new("sst")).unwrap();
        let mut buf = [0u8; 7];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"payload");

        file.truncate(3).unwrap();
        assert_eq!(mem.file(Path::new("sst")).unwrap().data().len(), 7);
    }

    #[test]
    fn management_ops_delegate() {
        let mem = Arc::new(MemFileSystem::new());
        let fs = EncryptedFileSystem::new(mem.clone(), Arc::new(sidecar_provider(&mem)));

        fs.open(Path::new("a")).unwrap();
        assert!(fs.exists(Path::new("a")).unwrap());
        fs.rename(Path::new("a"), Path::new("b")).unwrap();
        fs.remove(Path::new("b")).unwrap();
        assert!(!fs.exists(Path::new("b")).unwrap());
    }
}
