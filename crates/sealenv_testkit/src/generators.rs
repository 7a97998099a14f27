//! Property-based test generators using proptest.
//!
//! Provides strategies for cipher geometries, block contents, and
//! sequences of file writes.

use proptest::prelude::*;

/// A cipher geometry: block size and metadata size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per block.
    pub block_size: usize,
    /// Metadata bytes per block.
    pub metadata_size: usize,
}

/// A single positioned write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    /// Plaintext offset.
    pub offset: u64,
    /// Bytes to write.
    pub data: Vec<u8>,
}

/// Strategy for small cipher geometries.
///
/// Block sizes stay small so that ranges cross many block boundaries.
pub fn geometry_strategy() -> impl Strategy<Value = Geometry> {
    (prop::sample::select(vec![1usize, 7, 16, 64, 100, 512]), 8usize..=32).prop_map(
        |(block_size, metadata_size)| Geometry {
            block_size,
            metadata_size,
        },
    )
}

/// Strategy for block indices, biased towards small values.
pub fn block_index_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        4 => 0u64..16,
        1 => 16u64..10_000,
    ]
}

/// Strategy for a full block of arbitrary bytes.
pub fn block_strategy(block_size: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), block_size)
}

/// Strategy for write sequences confined to the first `max_len` bytes.
pub fn write_ops_strategy(max_len: u64, max_ops: usize) -> impl Strategy<Value = Vec<WriteOp>> {
    let op = (0..max_len).prop_flat_map(move |offset| {
        let room = (max_len - offset).max(1) as usize;
        prop::collection::vec(any::<u8>(), 1..=room).prop_map(move |data| WriteOp { offset, data })
    });
    prop::collection::vec(op, 1..=max_ops)
}

/// Applies `ops` to an in-memory model of the plaintext file.
///
/// Ciphertext holes do not decrypt to zeros, so the file under test should
/// be pre-filled to `max_len` and `model` sized to match.
pub fn apply_to_model(model: &mut [u8], ops: &[WriteOp]) {
    for op in ops {
        let start = op.offset as usize;
        model[start..start + op.data.len()].copy_from_slice(&op.data);
    }
}
