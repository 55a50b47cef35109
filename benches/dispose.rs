//! Handle lifecycle benchmarks
//!
//! Measures the cost of the atomic fast paths: validity checks, reference
//! access, and contended vs uncontended dispose.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hybrid_handle::{DestroyError, Destructor, ForeignRef, HybridHandle};
use std::sync::{Arc, Barrier};
use std::thread;

struct Noop;

impl Destructor for Noop {
    fn destroy(&self, reference: ForeignRef) -> Result<(), DestroyError> {
        black_box(reference);
        Ok(())
    }
}

fn reference() -> ForeignRef {
    ForeignRef::new(0xABCD).unwrap()
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");
    let handle = HybridHandle::new(reference(), Noop);

    group.bench_function("is_valid", |b| b.iter(|| black_box(&handle).is_valid()));
    group.bench_function("access_reference", |b| {
        b.iter(|| black_box(&handle).access_reference())
    });

    handle.dispose().unwrap();
    group.bench_function("access_disposed", |b| {
        b.iter(|| black_box(&handle).access_reference())
    });

    group.finish();
}

fn bench_dispose(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispose");

    group.bench_function("attached", |b| {
        b.iter_batched(
            || HybridHandle::new(reference(), Noop),
            |handle| handle.dispose(),
            criterion::BatchSize::SmallInput,
        );
    });

    let disposed = HybridHandle::new(reference(), Noop);
    disposed.dispose().unwrap();
    group.bench_function("repeat", |b| b.iter(|| black_box(&disposed).dispose()));

    // Contended: every thread races the same handle
    for threads in [2usize, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("contended", threads), threads, |b, &threads| {
            b.iter(|| {
                let handle = Arc::new(HybridHandle::new(reference(), Noop));
                let barrier = Arc::new(Barrier::new(threads));
                let workers: Vec<_> = (0..threads)
                    .map(|_| {
                        let handle = Arc::clone(&handle);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            handle.dispose()
                        })
                    })
                    .collect();
                for worker in workers {
                    let _ = worker.join();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reads, bench_dispose);
criterion_main!(benches);
