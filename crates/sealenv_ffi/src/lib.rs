//! # SealEnv FFI
//!
//! Stable C ABI for plugging caller-supplied block ciphers into SealEnv.
//!
//! This crate provides:
//! - `sealenv_create_encrypted_env`, the environment factory
//! - Encrypted file handles for reading and writing through an environment
//! - Error code mapping and a thread-local last-error message
//!
//! ## Ownership
//!
//! Handles returned by this crate are owned by the caller and released with
//! the matching `*_destroy` / `*_close` function. The cipher's `userdata`
//! is owned by the environment once creation succeeds; its destroy
//! callback runs exactly once, after the environment handle and every file
//! opened from it have been released.

#![warn(missing_docs)]

mod cipher;
mod env;
mod error;
mod file;

pub use cipher::{DecryptBlockFn, DestroyFn, EncryptBlockFn};
pub use env::{
    sealenv_create_encrypted_env, sealenv_create_encrypted_env_with_suffix,
    sealenv_env_block_size, sealenv_env_destroy, sealenv_env_remove_file,
    sealenv_env_rename_file, SealEnvHandle,
};
pub use error::{sealenv_clear_error, sealenv_get_last_error, SealEnvResult};
pub use file::{
    sealenv_file_close, sealenv_file_open, sealenv_file_read_at, sealenv_file_size,
    sealenv_file_sync, sealenv_file_write_at, SealEnvFileHandle,
};
