//! Cipher stream benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sealenv_bench::utils::{random_data, random_indices, xor_stream};
use sealenv_core::{BlockAccessCipherStream, MemFileSystem, OsFileSystem};
use sealenv_testkit::{AesKey, Aes256GcmCipher};
use std::path::Path;
use tempfile::TempDir;

/// Benchmark per-block encryption with the sidecar in memory.
fn bench_encrypt_block_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypt_block_memory");

    for size in [512, 4096, 16384].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let fs = MemFileSystem::new();
            let stream = xor_stream(&fs, Path::new("bench"), size, 16);
            let mut scratch = stream.allocate_scratch();
            let mut block = random_data(size);
            let mut index = 0u64;

            b.iter(|| {
                stream
                    .encrypt_block(black_box(index % 1024), &mut block, &mut scratch)
                    .unwrap();
                index += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark per-block decryption of random blocks.
fn bench_decrypt_block_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("decrypt_block_random");
    let size = 4096;
    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function("xor", |b| {
        let fs = MemFileSystem::new();
        let stream = xor_stream(&fs, Path::new("bench"), size, 16);
        let mut scratch = stream.allocate_scratch();
        let mut block = random_data(size);
        for i in 0..1024 {
            stream.encrypt_block(i, &mut block, &mut scratch).unwrap();
        }
        let indices = random_indices(1024, 1024);
        let mut i = 0usize;

        b.iter(|| {
            let index = indices[i % indices.len()];
            // Decrypting ciphertext of another block is fine for timing
            stream.decrypt_block(black_box(index), &mut block, &mut scratch).ok();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark sidecar-backed streams on disk.
fn bench_encrypt_block_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypt_block_file");

    // Fewer samples for file operations
    group.sample_size(50);

    for size in [4096, 16384].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let fs = OsFileSystem::new();
            let stream = xor_stream(&fs, &temp_dir.path().join("bench.sst"), size, 16);
            let mut scratch = stream.allocate_scratch();
            let mut block = random_data(size);
            let mut index = 0u64;

            b.iter(|| {
                stream
                    .encrypt_block(black_box(index), &mut block, &mut scratch)
                    .unwrap();
                index += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark offset-level encryption of unaligned ranges.
fn bench_unaligned_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("unaligned_range");

    for len in [100, 1000, 10_000].iter() {
        group.throughput(Throughput::Bytes(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let fs = MemFileSystem::new();
            let stream = xor_stream(&fs, Path::new("bench"), 4096, 16);
            let mut data = random_data(len);

            b.iter(|| {
                stream.encrypt(black_box(1234), &mut data).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark AES-256-GCM blocks for comparison with the XOR baseline.
fn bench_aes_gcm_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("aes_gcm_block");
    let size = 4096;
    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function("encrypt", |b| {
        let cipher = Aes256GcmCipher::new(&AesKey::generate(), size);
        let descriptor = cipher.into_descriptor().unwrap();
        let mut block = random_data(size);
        let mut metadata = vec![0u8; descriptor.metadata_size()];

        b.iter(|| {
            descriptor
                .encrypt(black_box(7), &mut block, &mut metadata)
                .unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encrypt_block_memory,
    bench_decrypt_block_random,
    bench_encrypt_block_file,
    bench_unaligned_range,
    bench_aes_gcm_block,
);

criterion_main!(benches);
