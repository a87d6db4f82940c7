//! Substrate Benchmarks
//!
//! Store and search throughput against the simulated backends, with and
//! without L2 spill.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_memory::{Metadata, PersistentConfig, SearchOptions, Substrate, SubstrateConfig};

use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn config(capacity: usize) -> SubstrateConfig {
    SubstrateConfig::default()
        .with_dimensions(128)
        .with_capacity(capacity)
        .with_persistent(PersistentConfig::in_memory())
}

fn seeded(runtime: &tokio::runtime::Runtime, capacity: usize, records: usize) -> Substrate {
    let mut substrate = Substrate::sim_with_config(42, config(capacity)).unwrap();
    runtime.block_on(async {
        for i in 0..records {
            substrate
                .store(&format!("record {i} about topic {}", i % 17), Metadata::new())
                .await
                .unwrap();
        }
    });
    substrate
}

// =============================================================================
// Store Benchmarks
// =============================================================================

fn bench_store_resident(c: &mut Criterion) {
    let runtime = runtime();
    c.bench_function("substrate/store_resident", |b| {
        b.iter_batched(
            || Substrate::sim_with_config(42, config(1_000)).unwrap(),
            |mut substrate| {
                runtime.block_on(async {
                    black_box(
                        substrate
                            .store("Alice is a software engineer at Acme Corp", Metadata::new())
                            .await
                            .unwrap(),
                    );
                });
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_store_with_spill(c: &mut Criterion) {
    let runtime = runtime();
    let mut substrate = seeded(&runtime, 64, 64);
    let mut i = 0u64;

    c.bench_function("substrate/store_with_spill", |b| {
        b.iter(|| {
            i += 1;
            let content = format!("spilling note {i}");
            runtime.block_on(async {
                black_box(substrate.store(&content, Metadata::new()).await.unwrap());
            });
        });
    });
}

// =============================================================================
// Search Benchmarks
// =============================================================================

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("substrate/search");
    group.measurement_time(Duration::from_secs(5));
    let runtime = runtime();

    for record_count in [100, 1_000] {
        let mut substrate = seeded(&runtime, record_count, record_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(record_count),
            &record_count,
            |b, _| {
                b.iter(|| {
                    runtime.block_on(async {
                        black_box(
                            substrate
                                .search("record about topic 3", SearchOptions::new().with_k(10))
                                .await
                                .unwrap(),
                        );
                    });
                });
            },
        );
    }

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let runtime = runtime();
    let substrate = seeded(&runtime, 256, 256);

    c.bench_function("substrate/stats", |b| {
        b.iter(|| black_box(substrate.stats()));
    });
}

criterion_group!(
    benches,
    bench_store_resident,
    bench_store_with_spill,
    bench_search,
    bench_stats,
);
criterion_main!(benches);
