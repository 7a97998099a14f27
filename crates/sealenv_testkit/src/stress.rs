//! Stress tests for cipher streams and encrypted files.
//!
//! These helpers verify behavior under concurrent access: many threads
//! driving one stream or one file, each on its own set of blocks.

use crate::fixtures::pattern;
use sealenv_core::{BlockAccessCipherStream, RandomAccessFile};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Blocks owned by each thread.
    pub blocks_per_thread: usize,
    /// Times each block is rewritten.
    pub rounds: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            blocks_per_thread: 64,
            rounds: 4,
        }
    }
}

impl StressConfig {
    /// Total number of distinct blocks touched.
    pub fn total_blocks(&self) -> usize {
        self.threads * self.blocks_per_thread
    }
}

/// Deterministic plaintext for `block_index` in `round`.
pub fn block_payload(block_index: u64, round: usize, block_size: usize) -> Vec<u8> {
    pattern(block_size, (block_index as u8) ^ (round as u8).wrapping_mul(0x3B))
}

/// Blocks owned by `thread` when blocks are interleaved across threads.
fn owned_blocks(thread: usize, config: &StressConfig) -> impl Iterator<Item = u64> + '_ {
    (0..config.blocks_per_thread).map(move |i| (i * config.threads + thread) as u64)
}

/// Encrypts and decrypts interleaved blocks of one stream from many threads.
///
/// Every thread owns every `threads`-th block, so concurrent calls never
/// target the same block. An operation fails if the cipher reports an
/// error or the round trip does not reproduce the plaintext.
pub fn stress_concurrent_blocks(
    stream: Arc<dyn BlockAccessCipherStream>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let stream = Arc::clone(&stream);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                let block_size = stream.block_size();
                let mut scratch = stream.allocate_scratch();

                for round in 0..config.rounds {
                    for index in owned_blocks(t, &config) {
                        let plaintext = block_payload(index, round, block_size);
                        let mut block = plaintext.clone();

                        let ok = stream.encrypt_block(index, &mut block, &mut scratch).is_ok()
                            && stream.decrypt_block(index, &mut block, &mut scratch).is_ok()
                            && block == plaintext;

                        if ok {
                            successful.fetch_add(1, Ordering::Relaxed);
                        } else {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Writes interleaved, block-aligned regions of one file from many threads,
/// then reads every block back.
pub fn stress_concurrent_file_writes(
    file: Arc<dyn RandomAccessFile>,
    block_size: usize,
    config: &StressConfig,
) -> StressTestResult {
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let file = Arc::clone(&file);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                for round in 0..config.rounds {
                    for index in owned_blocks(t, &config) {
                        let data = block_payload(index, round, block_size);
                        if file.write_at(index * block_size as u64, &data).is_err() {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let last_round = config.rounds.saturating_sub(1);
    let mut successful = 0usize;
    for index in 0..config.total_blocks() as u64 {
        let expected = block_payload(index, last_round, block_size);
        match file.read_exact_at(index * block_size as u64, block_size) {
            Ok(actual) if actual == expected => successful += 1,
            _ => {
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    StressTestResult::new(successful, failed.load(Ordering::Relaxed), start.elapsed())
}

/// Encrypts the final round of every block on the calling thread only.
///
/// With a deterministic cipher the resulting sidecar is the reference a
/// concurrent run must match.
pub fn sequential_reference(
    stream: &dyn BlockAccessCipherStream,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let block_size = stream.block_size();
    let mut scratch = stream.allocate_scratch();
    let (mut successful, mut failed) = (0usize, 0usize);

    for index in 0..config.total_blocks() as u64 {
        let mut block = block_payload(index, config.rounds.saturating_sub(1), block_size);
        match stream.encrypt_block(index, &mut block, &mut scratch) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphers::XorCipher;
    use sealenv_core::{
        BlockCipherStream, CipherDescriptor, FileSystem, MemFileSystem, OsFileSystem,
        SidecarChannel,
    };
    use std::path::Path;
    use tempfile::TempDir;

    fn xor_stream(fs: &dyn FileSystem, path: impl AsRef<Path>) -> BlockCipherStream {
        let descriptor = Arc::new(CipherDescriptor::new(128, 16, XorCipher::default()).unwrap());
        let sidecar = SidecarChannel::open(fs, path.as_ref(), ".meta", 16).unwrap();
        BlockCipherStream::new(descriptor, sidecar).unwrap()
    }

    fn small_config() -> StressConfig {
        StressConfig {
            threads: 4,
            blocks_per_thread: 16,
            rounds: 3,
        }
    }

    #[test]
    fn concurrent_blocks_roundtrip() {
        let fs = MemFileSystem::new();
        let stream: Arc<dyn BlockAccessCipherStream> = Arc::new(xor_stream(&fs, "a"));
        let config = small_config();

        let result = stress_concurrent_blocks(stream, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, config.total_blocks() * config.rounds);
    }

    #[test]
    fn concurrent_sidecar_matches_sequential() {
        let fs = MemFileSystem::new();
        let config = small_config();

        let concurrent: Arc<dyn BlockAccessCipherStream> = Arc::new(xor_stream(&fs, "c"));
        stress_concurrent_blocks(concurrent, &config);

        let sequential = xor_stream(&fs, "s");
        let result = sequential_reference(&sequential, &config);
        assert_eq!(result.failed_ops, 0);

        let c = fs.file(Path::new("c.meta")).unwrap().data();
        let s = fs.file(Path::new("s.meta")).unwrap().data();
        assert_eq!(c.len(), config.total_blocks() * 16);
        assert_eq!(c, s);
    }

    #[test]
    fn concurrent_sidecar_on_disk_matches_sequential() {
        let temp_dir = TempDir::new().unwrap();
        let fs = OsFileSystem::new();
        let config = StressConfig {
            threads: 8,
            blocks_per_thread: 64,
            rounds: 4,
        };

        {
            let concurrent: Arc<dyn BlockAccessCipherStream> =
                Arc::new(xor_stream(&fs, temp_dir.path().join("c")));
            let result = stress_concurrent_blocks(concurrent, &config);
            assert_eq!(result.failed_ops, 0);

            let sequential = xor_stream(&fs, temp_dir.path().join("s"));
            let result = sequential_reference(&sequential, &config);
            assert_eq!(result.failed_ops, 0);
        }

        let c = std::fs::read(temp_dir.path().join("c.meta")).unwrap();
        let s = std::fs::read(temp_dir.path().join("s.meta")).unwrap();
        assert_eq!(c.len(), config.total_blocks() * 16);
        assert_eq!(c, s);
    }

    #[test]
    fn result_throughput() {
        let result = StressTestResult::new(10, 0, Duration::from_secs(2));
        assert_eq!(result.total_ops, 10);
        assert!((result.ops_per_second - 5.0).abs() < f64::EPSILON);
    }
}
