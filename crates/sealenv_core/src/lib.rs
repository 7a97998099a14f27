//! # SealEnv Core
//!
//! Block-level encryption at rest for file-backed storage engines.
//!
//! Each data block is encrypted through a caller-supplied [`BlockCipher`].
//! Per-block metadata the cipher needs (nonces, tags, IVs) is kept out of
//! band in a companion *sidecar* file at `<data path>.meta`, one fixed-size
//! record per block.
//!
//! ## Design Principles
//!
//! - The cipher is a plug-in; this crate picks no algorithm and holds no keys
//! - Sidecar records are addressed by block index, so access order is free
//! - Metadata is persisted only after the cipher has succeeded
//! - Renames of data files are mirrored onto their sidecars
//! - Everything is `Send + Sync`; one stream may serve many threads
//!
//! ## Components
//!
//! - [`CipherDescriptor`] - Block size, metadata size, and the cipher
//! - [`SidecarChannel`] - Positioned metadata records for one data file
//! - [`BlockCipherStream`] - Per-block encrypt/decrypt against a sidecar
//! - [`SidecarEncryptionProvider`] - Creates one stream per opened file
//! - [`SidecarFileSystem`] - Renames and removes sidecars with their files
//! - [`EncryptedFileSystem`] / [`EncryptedFile`] - Transparent file encryption
//! - [`Env`] - All of the above stacked over a base file system
//!
//! ## Example
//!
//! ```rust
//! use sealenv_core::{BlockCipher, CipherDescriptor, Env, EnvConfig, MemFileSystem, RandomAccessFile};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct Xor(u8);
//!
//! impl BlockCipher for Xor {
//!     fn encrypt_block(&self, _: u64, data: &mut [u8], _: &mut [u8]) -> bool {
//!         data.iter_mut().for_each(|b| *b ^= self.0);
//!         true
//!     }
//!     fn decrypt_block(&self, _: u64, data: &mut [u8], _: &[u8]) -> bool {
//!         data.iter_mut().for_each(|b| *b ^= self.0);
//!         true
//!     }
//! }
//!
//! let descriptor = CipherDescriptor::new(4096, 16, Xor(0x5A)).unwrap();
//! let env = Env::encrypted_with(Arc::new(MemFileSystem::new()), descriptor, EnvConfig::default()).unwrap();
//!
//! let file = env.open_file(Path::new("000001.sst")).unwrap();
//! file.write_at(0, b"hello world").unwrap();
//!
//! let mut buf = [0u8; 11];
//! file.read_at(0, &mut buf).unwrap();
//! assert_eq!(&buf, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod descriptor;
mod encrypted;
mod env;
mod error;
mod file;
mod fs;
mod memory;
mod os;
mod provider;
mod rename;
mod sidecar;
mod stream;

pub use config::{EnvConfig, DEFAULT_SIDECAR_SUFFIX, LEGACY_SIDECAR_SUFFIX};
pub use descriptor::{BlockCipher, CipherDescriptor, SizedBlockCipher};
pub use encrypted::{EncryptedFile, EncryptedFileSystem};
pub use env::Env;
pub use error::{CipherOp, EnvError, EnvResult};
pub use file::RandomAccessFile;
pub use fs::FileSystem;
pub use memory::{MemFile, MemFileSystem};
pub use os::{OsFile, OsFileSystem};
pub use provider::{EncryptionProvider, SidecarEncryptionProvider, SIDECAR_PROVIDER_NAME};
pub use rename::SidecarFileSystem;
pub use sidecar::{sidecar_path, SidecarChannel};
pub use stream::{BlockAccessCipherStream, BlockCipherStream};
