//! Benchmark: invalidation propagation and batched watcher reruns

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sprout_core::reactive::{watch, Computed, Signal};
use sprout_core::scheduler::run_microtasks;

fn chain(source: &Signal<u64>, depth: usize) -> Computed<u64> {
    let first = {
        let source = source.clone();
        Computed::new(move || source.get() + 1)
    };
    (1..depth).fold(first, |previous, _| {
        Computed::try_new(move || Ok(previous.get()? + 1))
    })
}

fn benchmark_chain_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_propagation");
    for depth in [1usize, 10, 100] {
        let source = Signal::new(0u64);
        let tail = chain(&source, depth);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut value = 0u64;
            b.iter(|| {
                value += 1;
                source.set(value);
                black_box(tail.get().ok())
            });
        });
    }
    group.finish();
}

fn benchmark_fan_out(c: &mut Criterion) {
    let source = Signal::new(0u64);
    let readers: Vec<Computed<u64>> = (0..256)
        .map(|offset| {
            let source = source.clone();
            Computed::new(move || source.get() + offset)
        })
        .collect();

    c.bench_function("fan_out_256", |b| {
        let mut value = 0u64;
        b.iter(|| {
            value += 1;
            source.set(value);
            let sum: u64 = readers.iter().filter_map(|reader| reader.get().ok()).sum();
            black_box(sum)
        });
    });
}

fn benchmark_watcher_batch(c: &mut Criterion) {
    let signals: Vec<Signal<u64>> = (0..16).map(Signal::new).collect();
    let _watcher = {
        let signals = signals.clone();
        watch(move || {
            black_box(signals.iter().map(Signal::get).sum::<u64>());
        })
    };

    c.bench_function("watcher_batch_16_writes", |b| {
        let mut value = 100u64;
        b.iter(|| {
            value += 1;
            for signal in &signals {
                signal.set(value);
            }
            black_box(run_microtasks())
        });
    });
}

criterion_group!(
    benches,
    benchmark_chain_propagation,
    benchmark_fan_out,
    benchmark_watcher_batch
);
criterion_main!(benches);
