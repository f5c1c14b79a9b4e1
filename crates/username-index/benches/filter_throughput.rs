//! # Existence Index Throughput Benchmarks
//!
//! - Insert: O(k) hashes and atomic bit sets
//! - Lookup: O(k) hashes and bit loads, no locks
//! - Fast-path check: filter miss answered without the store
//! - Sizing: optimal parameter calculation

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use username_index::domain::calculate_optimal_parameters;
use username_index::{
    normalize, BloomFilter, ExistenceIndexService, InMemoryUserStore, IndexConfig,
    NormalizedUsername, UsernameExistenceApi,
};

fn usernames(prefix: &str, count: usize) -> Vec<NormalizedUsername> {
    (0..count)
        .map(|i| normalize(&format!("{}_{}", prefix, i), 64).unwrap())
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("username-index/insert");
    group.measurement_time(Duration::from_secs(5));

    for capacity in [10_000, 1_000_000] {
        let names = usernames("user", 10_000);
        group.throughput(Throughput::Elements(names.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("bulk_add_10000", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let filter = BloomFilter::new(capacity, 0.01);
                    for name in &names {
                        filter.add(black_box(name));
                    }
                    black_box(filter.inserted_count())
                });
            },
        );
    }

    let filter = Arc::new(BloomFilter::new(1_000_000, 0.01));
    let names = usernames("contended", 40_000);
    group.throughput(Throughput::Elements(names.len() as u64));
    group.bench_function("contended_add_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for chunk in names.chunks(10_000) {
                    let filter = &filter;
                    scope.spawn(move || {
                        for name in chunk {
                            filter.add(name);
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("username-index/lookup");
    group.measurement_time(Duration::from_secs(5));

    let filter = BloomFilter::new(100_000, 0.01);
    for name in usernames("member", 100_000) {
        filter.add(&name);
    }
    let present = normalize("member_4242", 64).unwrap();
    let absent = normalize("stranger_4242", 64).unwrap();

    group.bench_function("might_contain_present", |b| {
        b.iter(|| black_box(filter.might_contain(black_box(&present))));
    });
    group.bench_function("might_contain_absent", |b| {
        b.iter(|| black_box(filter.might_contain(black_box(&absent))));
    });

    group.finish();
}

fn bench_fast_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("username-index/service");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let store = Arc::new(InMemoryUserStore::with_usernames(
        (0..50_000).map(|i| format!("member_{}", i)),
    ));
    let index = ExistenceIndexService::with_config(
        store,
        IndexConfig::default().with_minimum_capacity(200_000),
    )
    .unwrap();
    runtime.block_on(index.initialize()).unwrap();

    group.bench_function("check_novel_username", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let name = format!("novel_{}", i);
            black_box(runtime.block_on(index.check_username_exists(&name)))
        });
    });

    group.bench_function("add_username", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            index.add_username(&format!("fresh_{}", i)).unwrap();
        });
    });

    group.finish();
}

fn bench_sizing(c: &mut Criterion) {
    c.bench_function("username-index/optimal_parameters", |b| {
        b.iter(|| calculate_optimal_parameters(black_box(1_000_000), black_box(0.01)));
    });
}

criterion_group!(benches, bench_insert, bench_lookup, bench_fast_path, bench_sizing);
criterion_main!(benches);
