//! Block ciphers for tests.
//!
//! - [`XorCipher`] - index-keyed XOR; length preserving, so it works with
//!   unaligned file I/O
//! - [`Aes256GcmCipher`] - real AEAD with the nonce and tag in the sidecar
//! - [`FailingCipher`] - rejects chosen blocks on demand
//! - [`CountingCipher`] - counts calls and drops

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use parking_lot::Mutex;
use rand::RngCore;
use sealenv_core::{BlockCipher, CipherDescriptor, EnvResult, SizedBlockCipher};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

const KEY_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// XORs each block with a keystream derived from its index.
///
/// Metadata records the block index as 8 little-endian bytes followed by
/// zero padding. Decryption rejects a record naming a different block.
/// Not secure; for tests only.
#[derive(Debug, Clone, Copy)]
pub struct XorCipher {
    seed: u8,
}

impl XorCipher {
    /// Creates a cipher with the given seed byte.
    #[must_use]
    pub const fn new(seed: u8) -> Self {
        Self { seed }
    }

    fn apply(&self, block_index: u64, data: &mut [u8]) {
        let key = block_index.wrapping_mul(KEY_MIX).to_le_bytes();
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= key[i % 8] ^ self.seed;
        }
    }
}

impl Default for XorCipher {
    fn default() -> Self {
        Self::new(0x5C)
    }
}

impl BlockCipher for XorCipher {
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool {
        self.apply(block_index, data);
        let index = block_index.to_le_bytes();
        let n = metadata.len().min(index.len());
        metadata.fill(0);
        metadata[..n].copy_from_slice(&index[..n]);
        true
    }

    fn decrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> bool {
        let fresh = metadata.iter().all(|&b| b == 0);
        let index = block_index.to_le_bytes();
        let n = metadata.len().min(index.len());
        if !fresh && metadata[..n] != index[..n] {
            return false;
        }
        self.apply(block_index, data);
        true
    }
}

impl SizedBlockCipher for XorCipher {
    const BLOCK_SIZE: usize = 4096;
    const METADATA_SIZE: usize = 16;
}

/// Size of an AES-256 key in bytes.
pub const AES_KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const GCM_NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const GCM_TAG_SIZE: usize = 16;

/// AES-256 key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey {
    bytes: [u8; AES_KEY_SIZE],
}

impl AesKey {
    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; AES_KEY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// AES-256-GCM with a detached tag.
///
/// Each encryption draws a fresh random nonce. The sidecar record is
/// `nonce (12 bytes) || tag (16 bytes)` and the block index is bound as
/// associated data, so a block moved to another index fails to decrypt.
///
/// Ciphertext is authenticated over the whole block: drive it with
/// block-aligned, whole-block I/O.
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
    block_size: usize,
}

impl Aes256GcmCipher {
    /// Metadata bytes per block.
    pub const METADATA_SIZE: usize = GCM_NONCE_SIZE + GCM_TAG_SIZE;

    /// Creates a cipher for blocks of `block_size` bytes.
    #[must_use]
    pub fn new(key: &AesKey, block_size: usize) -> Self {
        Self {
            cipher: Aes256Gcm::new(GenericArray::from_slice(&key.bytes)),
            block_size,
        }
    }

    /// Wraps the cipher in a descriptor with matching sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if the block size is zero.
    pub fn into_descriptor(self) -> EnvResult<CipherDescriptor> {
        CipherDescriptor::new(self.block_size, Self::METADATA_SIZE, self)
    }
}

impl BlockCipher for Aes256GcmCipher {
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool {
        if metadata.len() < Self::METADATA_SIZE {
            return false;
        }
        let (nonce_out, rest) = metadata.split_at_mut(GCM_NONCE_SIZE);
        rand::thread_rng().fill_bytes(nonce_out);

        let aad = block_index.to_le_bytes();
        match self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(nonce_out), &aad, data)
        {
            Ok(tag) => {
                rest[..GCM_TAG_SIZE].copy_from_slice(&tag);
                true
            }
            Err(_) => false,
        }
    }

    fn decrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> bool {
        if metadata.len() < Self::METADATA_SIZE {
            return false;
        }
        let nonce = Nonce::from_slice(&metadata[..GCM_NONCE_SIZE]);
        let tag = Tag::from_slice(&metadata[GCM_NONCE_SIZE..Self::METADATA_SIZE]);
        let aad = block_index.to_le_bytes();
        self.cipher
            .decrypt_in_place_detached(nonce, &aad, data, tag)
            .is_ok()
    }
}

/// Shared switchboard for a [`FailingCipher`].
#[derive(Debug, Default)]
pub struct CipherFaults {
    encrypt: Mutex<HashSet<u64>>,
    decrypt: Mutex<HashSet<u64>>,
}

impl CipherFaults {
    /// Makes encryption of `block_index` fail.
    pub fn fail_encrypt(&self, block_index: u64) {
        self.encrypt.lock().insert(block_index);
    }

    /// Makes decryption of `block_index` fail.
    pub fn fail_decrypt(&self, block_index: u64) {
        self.decrypt.lock().insert(block_index);
    }

    /// Clears every injected failure.
    pub fn heal(&self) {
        self.encrypt.lock().clear();
        self.decrypt.lock().clear();
    }
}

/// An [`XorCipher`] that fails selected blocks.
#[derive(Debug)]
pub struct FailingCipher {
    inner: XorCipher,
    faults: Arc<CipherFaults>,
}

impl FailingCipher {
    /// Creates a cipher and the handle that controls its failures.
    #[must_use]
    pub fn new() -> (Self, Arc<CipherFaults>) {
        let faults = Arc::new(CipherFaults::default());
        let cipher = Self {
            inner: XorCipher::default(),
            faults: Arc::clone(&faults),
        };
        (cipher, faults)
    }
}

impl BlockCipher for FailingCipher {
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool {
        if self.faults.encrypt.lock().contains(&block_index) {
            // Scribble on the metadata buffer; none of it may reach the sidecar
            metadata.fill(0xEE);
            return false;
        }
        self.inner.encrypt_block(block_index, data, metadata)
    }

    fn decrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> bool {
        if self.faults.decrypt.lock().contains(&block_index) {
            return false;
        }
        self.inner.decrypt_block(block_index, data, metadata)
    }
}

impl SizedBlockCipher for FailingCipher {
    const BLOCK_SIZE: usize = 64;
    const METADATA_SIZE: usize = 8;
}

/// Call and drop counters for a [`CountingCipher`].
#[derive(Debug, Default)]
pub struct CipherStats {
    /// Successful and failed encrypt calls.
    pub encrypts: AtomicUsize,
    /// Successful and failed decrypt calls.
    pub decrypts: AtomicUsize,
    /// Times the cipher was dropped.
    pub drops: AtomicUsize,
}

impl CipherStats {
    /// Returns the number of encrypt calls.
    pub fn encrypts(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    /// Returns the number of decrypt calls.
    pub fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    /// Returns the number of drops.
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// An [`XorCipher`] that counts calls and drops.
#[derive(Debug)]
pub struct CountingCipher {
    inner: XorCipher,
    stats: Arc<CipherStats>,
}

impl CountingCipher {
    /// Creates a cipher and its counters.
    #[must_use]
    pub fn new() -> (Self, Arc<CipherStats>) {
        let stats = Arc::new(CipherStats::default());
        let cipher = Self {
            inner: XorCipher::default(),
            stats: Arc::clone(&stats),
        };
        (cipher, stats)
    }
}

impl BlockCipher for CountingCipher {
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &mut [u8]) -> bool {
        self.stats.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt_block(block_index, data, metadata)
    }

    fn decrypt_block(&self, block_index: u64, data: &mut [u8], metadata: &[u8]) -> bool {
        self.stats.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt_block(block_index, data, metadata)
    }
}

impl SizedBlockCipher for CountingCipher {
    const BLOCK_SIZE: usize = 256;
    const METADATA_SIZE: usize = 16;
}

impl Drop for CountingCipher {
    fn drop(&mut self) {
        self.stats.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_records_block_index() {
        let cipher = XorCipher::default();
        let mut data = vec![0xABu8; 4096];
        let mut metadata = [0xFFu8; 16];

        assert!(cipher.encrypt_block(5, &mut data, &mut metadata));
        assert_ne!(data, vec![0xABu8; 4096]);
        assert_eq!(metadata, [5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(cipher.decrypt_block(5, &mut data, &metadata));
        assert_eq!(data, vec![0xABu8; 4096]);
    }

    #[test]
    fn xor_rejects_foreign_metadata() {
        let cipher = XorCipher::default();
        let mut data = vec![1u8; 32];
        let mut metadata = [0u8; 16];
        cipher.encrypt_block(3, &mut data, &mut metadata);

        assert!(!cipher.decrypt_block(4, &mut data, &metadata));
        assert!(cipher.decrypt_block(4, &mut data, &[0u8; 16]));
    }

    #[test]
    fn aes_roundtrip_and_tamper() {
        let cipher = Aes256GcmCipher::new(&AesKey::generate(), 128);
        let plaintext: Vec<u8> = (0..128u8).collect();
        let mut data = plaintext.clone();
        let mut metadata = [0u8; Aes256GcmCipher::METADATA_SIZE];

        assert!(cipher.encrypt_block(9, &mut data, &mut metadata));
        assert_ne!(data, plaintext);

        let mut tampered = data.clone();
        tampered[0] ^= 1;
        assert!(!cipher.decrypt_block(9, &mut tampered, &metadata));

        let mut moved = data.clone();
        assert!(!cipher.decrypt_block(10, &mut moved, &metadata));

        assert!(cipher.decrypt_block(9, &mut data, &metadata));
        assert_eq!(data, plaintext);
    }

    #[test]
    fn aes_nonces_differ() {
        let cipher = Aes256GcmCipher::new(&AesKey::from_bytes([7u8; AES_KEY_SIZE]), 16);
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        let mut meta_a = [0u8; 28];
        let mut meta_b = [0u8; 28];
        cipher.encrypt_block(0, &mut a, &mut meta_a);
        cipher.encrypt_block(0, &mut b, &mut meta_b);
        assert_ne!(meta_a[..12], meta_b[..12]);
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = AesKey::generate();
        assert!(format!("{key:?}").contains("REDACTED"));
    }

    #[test]
    fn failing_cipher_toggles() {
        let (cipher, faults) = FailingCipher::new();
        let mut data = [0u8; 64];
        let mut metadata = [0u8; 8];

        faults.fail_encrypt(2);
        assert!(!cipher.encrypt_block(2, &mut data, &mut metadata));
        assert!(cipher.encrypt_block(1, &mut data, &mut metadata));

        faults.heal();
        assert!(cipher.encrypt_block(2, &mut data, &mut metadata));
    }

    #[test]
    fn counting_cipher_counts_drop() {
        let (cipher, stats) = CountingCipher::new();
        let mut data = [0u8; 4];
        let mut metadata = [0u8; 16];
        cipher.encrypt_block(0, &mut data, &mut metadata);
        cipher.decrypt_block(0, &mut data, &metadata);
        drop(cipher);

        assert_eq!(stats.encrypts(), 1);
        assert_eq!(stats.decrypts(), 1);
        assert_eq!(stats.drops(), 1);
    }
}
