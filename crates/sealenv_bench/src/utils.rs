//! Benchmark utilities.

use rand::Rng;
use sealenv_core::{BlockCipherStream, CipherDescriptor, FileSystem, SidecarChannel};
use sealenv_testkit::XorCipher;
use std::path::Path;
use std::sync::Arc;

/// Generate random block data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate random block indices below `max`.
pub fn random_indices(count: usize, max: u64) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(0..max)).collect()
}

/// Opens a sidecar-backed [`XorCipher`] stream for `path` on `fs`.
pub fn xor_stream(
    fs: &dyn FileSystem,
    path: &Path,
    block_size: usize,
    metadata_size: usize,
) -> BlockCipherStream {
    let descriptor = CipherDescriptor::new(block_size, metadata_size, XorCipher::default())
        .expect("Failed to create descriptor");
    let sidecar = SidecarChannel::open(fs, path, ".meta", metadata_size)
        .expect("Failed to open sidecar");
    BlockCipherStream::new(Arc::new(descriptor), sidecar).expect("Failed to create stream")
}
