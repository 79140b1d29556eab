//! Throughput Benchmark for verkv
//!
//! Measures store operations and request decoding under various workloads.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use verkv::protocol::RequestDecoder;
use verkv::storage::Store;

/// Benchmark write operations
fn bench_write(c: &mut Criterion) {
    let store = Store::new();

    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(1));

    group.bench_function("write_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.write(format!("key:{}", i), None, Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("overwrite_same_key", |b| {
        let value = Bytes::from("x".repeat(1024));
        b.iter(|| black_box(store.write("hot", None, value.clone())));
    });

    group.finish();
}

/// Benchmark read operations
fn bench_read(c: &mut Criterion) {
    let store = Store::new();
    for i in 0..100_000 {
        store.write(format!("key:{}", i), None, Bytes::from(format!("value:{}", i)));
    }

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Elements(1));

    group.bench_function("read_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.read(&format!("key:{}", i % 100_000)));
            i += 1;
        });
    });

    group.bench_function("read_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(store.read(&format!("missing:{}", i)));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark compare-and-swap
fn bench_cas(c: &mut Criterion) {
    let store = Store::new();
    store.write("counter", None, Bytes::from("0"));

    c.bench_function("cas_success", |b| {
        let mut version = 1u64;
        b.iter(|| {
            version = store
                .compare_and_swap("counter", version, None, Bytes::from("v"))
                .unwrap_or(version);
        });
    });
}

/// Benchmark mixed readers and writers sharing the lock
fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    group.sample_size(20);

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store = Arc::new(Store::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..1_000 {
                            let key = format!("key:{}", i % 100);
                            if (i + t) % 4 == 0 {
                                store.write(key, None, Bytes::from("v"));
                            } else {
                                black_box(store.read(&key));
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                let _ = handle.join();
            }
        });
    });

    group.finish();
}

/// Benchmark request decoding
fn bench_decode(c: &mut Criterion) {
    let frame = b"set some:key 0 11\r\nhello world\r\n";

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(frame.len() as u64));

    group.bench_function("decode_set", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut buf = BytesMut::from(&frame[..]);
            black_box(decoder.decode(&mut buf))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_write,
    bench_read,
    bench_cas,
    bench_contention,
    bench_decode
);
criterion_main!(benches);
