use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use logos_docstore::keys::{self, KeySegment};
use logos_docstore::{merge_updates, Persistence, StoreConfig, UpdateQuery, YrsEngine};
use std::hint::black_box;
use yrs::{GetString, ReadTxn, Text, Transact, WriteTxn};

/// `count` text appends of `size` bytes each, as v1 updates.
fn text_updates(count: usize, size: usize) -> Vec<Vec<u8>> {
    let doc = yrs::Doc::new();
    let chunk = "a".repeat(size);
    (0..count)
        .map(|_| {
            let before = doc.transact().state_vector();
            {
                let mut txn = doc.transact_mut();
                let text = txn.get_or_insert_text("content");
                let len = text.get_string(&txn).len() as u32;
                text.insert(&mut txn, len, &chunk);
            }
            doc.transact().encode_state_as_update_v1(&before)
        })
        .collect()
}

fn bench_key_encode(c: &mut Criterion) {
    c.bench_function("key_encode_update", |b| {
        b.iter(|| black_box(keys::update_key(black_box("document-name"), black_box(123_456))))
    });
}

fn bench_key_decode(c: &mut Criterion) {
    let key = keys::update_key("document-name", 123_456);
    c.bench_function("key_decode_update", |b| {
        b.iter(|| {
            let segments = keys::decode(black_box(&key)).unwrap();
            black_box(segments.get(3).and_then(KeySegment::as_u32))
        })
    });
}

fn bench_merge_100_updates(c: &mut Criterion) {
    let updates = text_updates(100, 16);
    c.bench_function("merge_100_updates", |b| {
        b.iter(|| black_box(merge_updates(&YrsEngine, black_box(&updates)).unwrap()))
    });
}

fn bench_store_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let p = Persistence::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap();
    let update = text_updates(1, 1024).remove(0);

    c.bench_function("store_update_1KB", |b| {
        b.iter(|| rt.block_on(p.store_update("bench", black_box(update.clone()))).unwrap())
    });
}

fn bench_current_clock(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let p = Persistence::open(StoreConfig::for_testing(dir.path().join("db"))).unwrap();
    for update in text_updates(1000, 8) {
        drop(p.store_update("bench", update));
    }

    c.bench_function("current_clock_1000_records", |b| {
        b.iter(|| black_box(rt.block_on(p.current_clock("bench")).unwrap()))
    });
}

fn bench_get_ydoc_with_trim(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let updates = text_updates(600, 8);

    c.bench_function("get_ydoc_600_records_trim", |b| {
        b.iter_batched(
            || {
                let p = Persistence::in_memory().unwrap();
                for update in &updates {
                    drop(p.store_update("bench", update.clone()));
                }
                p
            },
            |p| {
                rt.block_on(async {
                    black_box(p.get_ydoc("bench").await.unwrap());
                    black_box(p.get_updates("bench", UpdateQuery::clocks_only()).await.unwrap());
                })
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_key_encode,
    bench_key_decode,
    bench_merge_100_updates,
    bench_store_update,
    bench_current_clock,
    bench_get_ydoc_with_trim,
);
criterion_main!(benches);
