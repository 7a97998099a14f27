//! Cipher descriptors: the pluggable per-block encrypt/decrypt contract.
//!
//! A [`CipherDescriptor`] pairs a caller-supplied [`BlockCipher`] with the
//! two sizes every stream built from it shares: the data block size and the
//! per-block metadata size. The cipher's own state (keys, counters) lives in
//! the implementing value; dropping the descriptor drops the cipher, which is
//! where any teardown belongs.

use crate::error::{CipherOp, EnvError, EnvResult};
use std::fmt;

/// A block cipher plugged into the encrypted environment.
///
/// Both methods mutate `data` in place and receive a metadata record of
/// exactly the descriptor's `metadata_size` bytes. A record that was never
/// written arrives zero-filled.
///
/// Returning `false` is the only way to signal a cryptographic failure such
/// as an authentication tag mismatch.
///
/// Implementations are called concurrently for distinct block indices and
/// must be safe for that.
pub trait BlockCipher: Send + Sync {
    /// Encrypts one block.
    ///
    /// `metadata` holds the block's current record; whatever the cipher
    /// leaves there is persisted once this returns `true`.
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool;

    /// Decrypts one block using its stored metadata record.
    fn decrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> bool;
}

/// A [`BlockCipher`] whose sizes are known at compile time.
pub trait SizedBlockCipher: BlockCipher {
    /// Plaintext/ciphertext block size in bytes.
    const BLOCK_SIZE: usize;
    /// Per-block metadata record size in bytes.
    const METADATA_SIZE: usize;
}

/// An immutable cipher description shared by every stream of an environment.
pub struct CipherDescriptor {
    block_size: usize,
    metadata_size: usize,
    cipher: Box<dyn BlockCipher>,
}

impl CipherDescriptor {
    /// Creates a descriptor from explicit sizes and a cipher.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidConfig`] if `block_size` is zero.
    pub fn new(
        block_size: usize,
        metadata_size: usize,
        cipher: impl BlockCipher + 'static,
    ) -> EnvResult<Self> {
        Self::from_boxed(block_size, metadata_size, Box::new(cipher))
    }

    /// Creates a descriptor from an already boxed cipher.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidConfig`] if `block_size` is zero.
    pub fn from_boxed(
        block_size: usize,
        metadata_size: usize,
        cipher: Box<dyn BlockCipher>,
    ) -> EnvResult<Self> {
        if block_size == 0 {
            return Err(EnvError::invalid_config("block size must be non-zero"));
        }
        Ok(Self {
            block_size,
            metadata_size,
            cipher,
        })
    }

    /// Creates a descriptor for a cipher with compile-time sizes.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidConfig`] if `C::BLOCK_SIZE` is zero.
    pub fn from_sized<C: SizedBlockCipher + 'static>(cipher: C) -> EnvResult<Self> {
        Self::new(C::BLOCK_SIZE, C::METADATA_SIZE, cipher)
    }

    /// Returns the block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the per-block metadata size in bytes.
    #[must_use]
    pub fn metadata_size(&self) -> usize {
        self.metadata_size
    }

    /// Runs the cipher's encrypt callback on one block.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidArgument`] if a buffer has the wrong
    /// length, or [`EnvError::Corruption`] if the cipher returns `false`.
    pub fn encrypt(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> EnvResult<()> {
        self.check_buffers(data, metadata)?;
        if self.cipher.encrypt_block(block_index, data, metadata) {
            Ok(())
        } else {
            Err(EnvError::corruption(block_index, CipherOp::Encrypt))
        }
    }

    /// Runs the cipher's decrypt callback on one block.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidArgument`] if a buffer has the wrong
    /// length, or [`EnvError::Corruption`] if the cipher returns `false`.
    pub fn decrypt(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> EnvResult<()> {
        self.check_buffers(data, metadata)?;
        if self.cipher.decrypt_block(block_index, data, metadata) {
            Ok(())
        } else {
            Err(EnvError::corruption(block_index, CipherOp::Decrypt))
        }
    }

    fn check_buffers(&self, data: &[u8], metadata: &[u8]) -> EnvResult<()> {
        if data.len() != self.block_size {
            return Err(EnvError::invalid_argument(format!(
                "data buffer is {} bytes, block size is {}",
                data.len(),
                self.block_size
            )));
        }
        if metadata.len() != self.metadata_size {
            return Err(EnvError::invalid_argument(format!(
                "metadata buffer is {} bytes, metadata size is {}",
                metadata.len(),
                self.metadata_size
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for CipherDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherDescriptor")
            .field("block_size", &self.block_size)
            .field("metadata_size", &self.metadata_size)
            .field("cipher", &"<dyn BlockCipher>")
            .finish()
    }
}
