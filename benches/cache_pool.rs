use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use cachemon::{CachePool, CacheRegistry};

fn populate(pool: &CachePool, count: usize) {
    for i in 0..count {
        pool.set(format!("preload_{i}"), json!({"idx": i}), None);
    }
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_get");
    for &size in &[100usize, 500, 1000] {
        let pool = CachePool::new("bench", size, Duration::from_secs(3600));
        populate(&pool, size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("hit", size), &size, |b, &size| {
            let mut i = 0usize;
            b.iter(|| {
                let key = format!("preload_{}", i % size);
                i += 1;
                pool.get(&key)
            });
        });
        group.bench_function(BenchmarkId::new("miss", size), |b| {
            b.iter(|| pool.get("absent"));
        });
    }
    group.finish();
}

fn bench_set_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_set");
    // Keep the pool permanently full so every few sets pay an eviction sort.
    let pool = CachePool::new("bench", 500, Duration::from_secs(3600));
    populate(&pool, 500);
    let mut i = 0usize;
    group.bench_function("overwrite_full_pool", |b| {
        b.iter(|| {
            pool.set(format!("k{i}"), json!(i), None);
            i += 1;
        });
    });
    group.finish();
}

fn bench_content_hash(c: &mut Criterion) {
    c.bench_function("content_hash", |b| {
        b.iter(|| CacheRegistry::content_hash(&["generate_commentary", "homer", "s05e12"]));
    });
}

criterion_group!(benches, bench_get, bench_set_with_eviction, bench_content_hash);
criterion_main!(benches);
