//! Test fixtures and environment helpers.
//!
//! Provides convenience functions for setting up encrypted environments
//! over temporary directories or in-memory file systems.

use crate::ciphers::XorCipher;
use sealenv_core::{
    BlockCipher, CipherDescriptor, Env, EnvConfig, MemFileSystem, RandomAccessFile,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// An encrypted environment over a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TestEnv {
    /// The environment.
    pub env: Env,
    temp_dir: TempDir,
}

impl TestEnv {
    /// Creates an environment using [`XorCipher`] with its default sizes.
    pub fn xor() -> Self {
        Self::with_cipher(4096, 16, XorCipher::default(), EnvConfig::default())
    }

    /// Creates an environment with a custom cipher and configuration.
    pub fn with_cipher(
        block_size: usize,
        metadata_size: usize,
        cipher: impl BlockCipher + 'static,
        config: EnvConfig,
    ) -> Self {
        let descriptor = CipherDescriptor::new(block_size, metadata_size, cipher)
            .expect("Failed to create cipher descriptor");
        Self::with_descriptor(descriptor, config)
    }

    /// Creates an environment from a prepared descriptor.
    pub fn with_descriptor(descriptor: CipherDescriptor, config: EnvConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let env = Env::encrypted(descriptor, config).expect("Failed to create environment");
        Self { env, temp_dir }
    }

    /// Returns the temporary directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the path of `name` inside the temporary directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Returns the sidecar path of `name` inside the temporary directory.
    pub fn sidecar(&self, name: &str) -> PathBuf {
        self.env.sidecar_path(&self.path(name))
    }

    /// Reads the raw (ciphertext) bytes of `name`.
    pub fn raw(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path(name)).expect("Failed to read data file")
    }

    /// Reads the raw sidecar bytes of `name`.
    pub fn raw_sidecar(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.sidecar(name)).expect("Failed to read sidecar file")
    }

    /// Writes `data` at offset 0 of `name` and syncs it.
    pub fn write_file(&self, name: &str, data: &[u8]) {
        let file = self.env.open_file(&self.path(name)).expect("Failed to open file");
        file.write_at(0, data).expect("Failed to write file");
        file.sync().expect("Failed to sync file");
    }

    /// Reads the whole plaintext of `name`.
    pub fn read_file(&self, name: &str) -> Vec<u8> {
        let file = self.env.open_file(&self.path(name)).expect("Failed to open file");
        let size = file.size().expect("Failed to get file size");
        file.read_exact_at(0, size as usize).expect("Failed to read file")
    }
}

impl std::ops::Deref for TestEnv {
    type Target = Env;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

/// An encrypted environment over an in-memory file system.
pub struct MemEnv {
    /// The environment.
    pub env: Env,
    /// The backing file system, for inspecting ciphertext and sidecars.
    pub fs: Arc<MemFileSystem>,
}

impl MemEnv {
    /// Creates an in-memory environment with [`XorCipher`].
    pub fn xor() -> Self {
        Self::with_cipher(4096, 16, XorCipher::default(), EnvConfig::default())
    }

    /// Creates an in-memory environment with a custom cipher.
    pub fn with_cipher(
        block_size: usize,
        metadata_size: usize,
        cipher: impl BlockCipher + 'static,
        config: EnvConfig,
    ) -> Self {
        let fs = Arc::new(MemFileSystem::new());
        let descriptor = CipherDescriptor::new(block_size, metadata_size, cipher)
            .expect("Failed to create cipher descriptor");
        let env = Env::encrypted_with(fs.clone(), descriptor, config)
            .expect("Failed to create environment");
        Self { env, fs }
    }

    /// Returns the raw bytes stored at `path`, if any.
    pub fn raw(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.file(Path::new(path)).map(|f| f.data())
    }
}

impl std::ops::Deref for MemEnv {
    type Target = Env;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

/// Runs a test with a temporary [`XorCipher`] environment on disk.
///
/// # Example
///
/// ```rust
/// use sealenv_testkit::with_temp_env;
///
/// with_temp_env(|env| {
///     env.write_file("000001.sst", b"hello");
///     assert_eq!(env.read_file("000001.sst"), b"hello");
/// });
/// ```
pub fn with_temp_env<F, R>(f: F) -> R
where
    F: FnOnce(&TestEnv) -> R,
{
    let env = TestEnv::xor();
    f(&env)
}

/// Runs a test with an in-memory [`XorCipher`] environment.
pub fn with_mem_env<F, R>(f: F) -> R
where
    F: FnOnce(&MemEnv) -> R,
{
    let env = MemEnv::xor();
    f(&env)
}

/// Deterministic test payload of `len` bytes.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_env_roundtrip() {
        with_temp_env(|env| {
            let data = pattern(10_000, 3);
            env.write_file("a.sst", &data);

            assert_eq!(env.read_file("a.sst"), data);
            assert_ne!(env.raw("a.sst"), data);
            assert_eq!(env.raw_sidecar("a.sst").len(), 3 * 16);
        });
    }

    #[test]
    fn mem_env_roundtrip() {
        with_mem_env(|env| {
            let file = env.open_file(Path::new("log")).unwrap();
            file.write_at(0, b"in memory").unwrap();

            assert_eq!(env.raw("log").unwrap().len(), 9);
            assert_eq!(env.raw("log.meta").unwrap().len(), 16);
            assert!(env.raw("missing").is_none());
        });
    }

    #[test]
    fn pattern_is_deterministic() {
        assert_eq!(pattern(8, 1), pattern(8, 1));
        assert_ne!(pattern(8, 1), pattern(8, 2));
    }
}
