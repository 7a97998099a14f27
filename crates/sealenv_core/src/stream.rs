//! Block-access cipher streams.
//!
//! A storage engine encrypts a file through a [`BlockAccessCipherStream`]:
//! it asks for the block size, allocates a scratch buffer for metadata, and
//! then encrypts or decrypts blocks by index. [`BlockCipherStream`] is the
//! implementation that keeps each block's metadata in a sidecar file.

use crate::descriptor::CipherDescriptor;
use crate::error::{EnvError, EnvResult};
use crate::sidecar::SidecarChannel;
use std::sync::Arc;
use tracing::debug;

/// The per-block encryption contract a storage engine drives.
///
/// Calls are independent: any block may be processed at any time, in any
/// order, any number of times, and from several threads at once as long as
/// concurrent calls target distinct blocks.
pub trait BlockAccessCipherStream: Send + Sync {
    /// Returns the fixed block size so the engine can align its I/O.
    fn block_size(&self) -> usize;

    /// Returns a zeroed scratch buffer large enough for one metadata record.
    fn allocate_scratch(&self) -> Vec<u8>;

    /// Encrypts one block in place.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Corruption`] if the cipher rejects the block, or
    /// an I/O error if its metadata cannot be read or written.
    fn encrypt_block(&self, block_index: u64, data: &mut [u8], scratch: &mut [u8]) -> EnvResult<()>;

    /// Decrypts one block in place.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Corruption`] if the cipher rejects the block, or
    /// an I/O error if its metadata cannot be read.
    fn decrypt_block(&self, block_index: u64, data: &mut [u8], scratch: &mut [u8]) -> EnvResult<()>;

    /// Flushes any buffered per-block metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush_metadata(&self) -> EnvResult<()> {
        Ok(())
    }

    /// Makes per-block metadata durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync_metadata(&self) -> EnvResult<()> {
        Ok(())
    }

    /// Encrypts `data`, which sits at `file_offset` in the file.
    ///
    /// The range may start and end anywhere. A partially covered block is
    /// staged in a zero-filled block buffer, processed whole, and only the
    /// covered bytes are copied back, so ciphertext length always equals
    /// plaintext length. Partial blocks therefore need a length-preserving
    /// (keystream-style) cipher; whole blocks work with any cipher.
    ///
    /// # Errors
    ///
    /// Returns the first block error encountered.
    fn encrypt(&self, file_offset: u64, data: &mut [u8]) -> EnvResult<()> {
        process_range(self, file_offset, data, Direction::Encrypt)
    }

    /// Decrypts `data`, which sits at `file_offset` in the file.
    ///
    /// See [`BlockAccessCipherStream::encrypt`] for how partial blocks are handled.
    ///
    /// # Errors
    ///
    /// Returns the first block error encountered.
    fn decrypt(&self, file_offset: u64, data: &mut [u8]) -> EnvResult<()> {
        process_range(self, file_offset, data, Direction::Decrypt)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

fn process_range<S>(stream: &S, file_offset: u64, data: &mut [u8], direction: Direction) -> EnvResult<()>
where
    S: BlockAccessCipherStream + ?Sized,
{
    let block_size = stream.block_size();
    if block_size == 0 {
        return Err(EnvError::invalid_config("stream reports a zero block size"));
    }
    if data.is_empty() {
        return Ok(());
    }

    let mut block_index = file_offset / block_size as u64;
    let mut block_offset = (file_offset % block_size as u64) as usize;
    let mut scratch = stream.allocate_scratch();
    let mut staging: Option<Vec<u8>> = None;
    let mut remaining = data;

    while !remaining.is_empty() {
        let n = remaining.len().min(block_size - block_offset);
        let (chunk, rest) = std::mem::take(&mut remaining).split_at_mut(n);

        if n == block_size {
            run_block(stream, direction, block_index, chunk, &mut scratch)?;
        } else {
            let block = staging.get_or_insert_with(|| vec![0u8; block_size]);
            block.fill(0);
            block[block_offset..block_offset + n].copy_from_slice(chunk);
            run_block(stream, direction, block_index, block, &mut scratch)?;
            chunk.copy_from_slice(&block[block_offset..block_offset + n]);
        }

        remaining = rest;
        if remaining.is_empty() {
            break;
        }
        block_offset = 0;
        block_index = block_index.checked_add(1).ok_or_else(|| {
            EnvError::invalid_argument("range extends past the last addressable block")
        })?;
    }

    Ok(())
}

fn run_block<S>(
    stream: &S,
    direction: Direction,
    block_index: u64,
    block: &mut [u8],
    scratch: &mut [u8],
) -> EnvResult<()>
where
    S: BlockAccessCipherStream + ?Sized,
{
    match direction {
        Direction::Encrypt => stream.encrypt_block(block_index, block, scratch),
        Direction::Decrypt => stream.decrypt_block(block_index, block, scratch),
    }
}

/// A cipher stream whose per-block metadata lives in a sidecar file.
///
/// Shares the [`CipherDescriptor`] with every other stream of the
/// environment and exclusively owns one [`SidecarChannel`]. Dropping the
/// stream closes the sidecar.
///
/// # Example
///
/// ```rust
/// use sealenv_core::{
///     BlockAccessCipherStream, BlockCipher, BlockCipherStream, CipherDescriptor,
///     MemFileSystem, SidecarChannel,
/// };
/// use std::path::Path;
/// use std::sync::Arc;
///
/// struct Flip;
///
/// impl BlockCipher for Flip {
///     fn encrypt_block(&self, _: u64, data: &mut [u8], meta: &mut [u8]) -> bool {
///         data.iter_mut().for_each(|b| *b ^= 0xFF);
///         meta[0] = 1;
///         true
///     }
///     fn decrypt_block(&self, _: u64, data: &mut [u8], meta: &[u8]) -> bool {
///         data.iter_mut().for_each(|b| *b ^= 0xFF);
///         meta[0] == 1
///     }
/// }
///
/// let fs = MemFileSystem::new();
/// let descriptor = Arc::new(CipherDescriptor::new(8, 1, Flip).unwrap());
/// let sidecar = SidecarChannel::open(&fs, Path::new("data"), ".meta", 1).unwrap();
/// let stream = BlockCipherStream::new(descriptor, sidecar).unwrap();
///
/// let mut block = *b"plaintxt";
/// let mut scratch = stream.allocate_scratch();
/// stream.encrypt_block(0, &mut block, &mut scratch).unwrap();
/// stream.decrypt_block(0, &mut block, &mut scratch).unwrap();
/// assert_eq!(&block, b"plaintxt");
/// ```
#[derive(Debug)]
pub struct BlockCipherStream {
    descriptor: Arc<CipherDescriptor>,
    sidecar: SidecarChannel,
}

impl BlockCipherStream {
    /// Binds a descriptor to an open sidecar channel.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::InvalidConfig`] if the channel's record size
    /// differs from the descriptor's metadata size.
    pub fn new(descriptor: Arc<CipherDescriptor>, sidecar: SidecarChannel) -> EnvResult<Self> {
        if sidecar.metadata_size() != descriptor.metadata_size() {
            return Err(EnvError::invalid_config(format!(
                "sidecar records are {} bytes, descriptor metadata is {}",
                sidecar.metadata_size(),
                descriptor.metadata_size()
            )));
        }
        Ok(Self {
            descriptor,
            sidecar,
        })
    }

    /// Returns the shared descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<CipherDescriptor> {
        &self.descriptor
    }

    /// Returns the sidecar channel.
    #[must_use]
    pub fn sidecar(&self) -> &SidecarChannel {
        &self.sidecar
    }

    /// Closes the stream, reporting any error from the final sidecar flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be flushed.
    pub fn close(self) -> EnvResult<()> {
        self.sidecar.close()
    }

    fn metadata_slot<'a>(&self, scratch: &'a mut [u8]) -> EnvResult<&'a mut [u8]> {
        let size = self.descriptor.metadata_size();
        if scratch.len() < size {
            return Err(EnvError::invalid_argument(format!(
                "scratch buffer is {} bytes, need at least {size}",
                scratch.len()
            )));
        }
        Ok(&mut scratch[..size])
    }
}

impl BlockAccessCipherStream for BlockCipherStream {
    fn block_size(&self) -> usize {
        self.descriptor.block_size()
    }

    fn allocate_scratch(&self) -> Vec<u8> {
        vec![0u8; self.descriptor.metadata_size()]
    }

    fn encrypt_block(&self, block_index: u64, data: &mut [u8], scratch: &mut [u8]) -> EnvResult<()> {
        let metadata = self.metadata_slot(scratch)?;
        self.sidecar.read_metadata(block_index, metadata)?;

        // The record is persisted only once the cipher has produced ciphertext.
        if let Err(e) = self.descriptor.encrypt(block_index, data, metadata) {
            debug!(block_index, error = %e, "block encryption rejected");
            return Err(e);
        }

        self.sidecar.write_metadata(block_index, metadata)
    }

    fn decrypt_block(&self, block_index: u64, data: &mut [u8], scratch: &mut [u8]) -> EnvResult<()> {
        let metadata = self.metadata_slot(scratch)?;
        self.sidecar.read_metadata(block_index, metadata)?;

        self.descriptor
            .decrypt(block_index, data, metadata)
            .inspect_err(|e| debug!(block_index, error = %e, "block decryption rejected"))
    }

    fn flush_metadata(&self) -> EnvResult<()> {
        self.sidecar.flush()
    }

    fn sync_metadata(&self) -> EnvResult<()> {
        self.sidecar.sync()
    }
}
