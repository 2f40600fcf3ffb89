use common::api::BufferPoolManager;
use criterion::{criterion_group, criterion_main, Criterion};

use buffer_pool_manager::LruBufferPoolManager;

fn sequential_new_page(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let bpm = LruBufferPoolManager::new(dir.path().join("bench.db"), 64).unwrap();

    c.bench_function("new_page sequential allocate", |b| {
        b.iter(|| {
            bpm.new_page().unwrap();
        })
    });
}

fn repeated_fetch_hot_page(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let bpm = LruBufferPoolManager::new(dir.path().join("bench.db"), 64).unwrap();
    let page_id = bpm.new_page().unwrap().page_id();

    c.bench_function("fetch_page cache hit", |b| {
        b.iter(|| {
            bpm.fetch_page(page_id).unwrap();
        })
    });
}

fn fetch_under_thrash(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let bpm = LruBufferPoolManager::new(dir.path().join("bench.db"), 4);
    let bpm = bpm.unwrap();
    let page_ids: Vec<_> = (0..64).map(|_| bpm.new_page().unwrap().page_id()).collect();

    c.bench_function("fetch_page with constant eviction", |b| {
        b.iter(|| {
            for &page_id in &page_ids {
                bpm.fetch_page(page_id).unwrap();
            }
        })
    });
}

criterion_group!(benches, sequential_new_page, repeated_fetch_hot_page, fetch_under_thrash);
criterion_main!(benches);
