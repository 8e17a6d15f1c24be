//! Benchmarks for block store and chunker operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipfsd_block::chunker::{chunk_bytes, ChunkerConfig};
use ipfsd_block::cid::Codec;
use ipfsd_block::memory_store::MemoryBlockStore;
use ipfsd_block::{Block, BlockStore};
use ipfsd_crypto::HashAlgorithm;

fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

fn bench_put_block(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("blockstore_put");

    for size in [1024, 64 * 1024, 256 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = generate_data(size);
            b.iter(|| {
                rt.block_on(async {
                    let store = MemoryBlockStore::new();
                    let block = Block::encode(Codec::Raw, HashAlgorithm::Sha2_256, data.clone().into()).unwrap();
                    store.put(&block).await.unwrap();
                    black_box(block.cid)
                })
            });
        });
    }

    group.finish();
}

fn bench_get_block(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("blockstore_get");

    for size in [1024, 64 * 1024, 256 * 1024].iter() {
        let data = generate_data(*size);
        let store = MemoryBlockStore::new();
        let block = Block::encode(Codec::Raw, HashAlgorithm::Sha2_256, data.into()).unwrap();
        rt.block_on(async { store.put(&block).await.unwrap() });

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let result = store.try_get(&block.cid).await.unwrap();
                    black_box(result)
                })
            });
        });
    }

    group.finish();
}

fn bench_chunking(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("chunking");

    for size in [64 * 1024, 256 * 1024, 1024 * 1024, 4 * 1024 * 1024].iter() {
        let data = generate_data(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let leaves = chunk_bytes(&data, &ChunkerConfig::default()).await.unwrap();
                    black_box(leaves.len())
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put_block, bench_get_block, bench_chunking);
criterion_main!(benches);
