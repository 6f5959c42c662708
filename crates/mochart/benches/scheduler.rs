//! Scheduler and geometry benchmarks.
//!
//! Run with: `cargo bench -p mochart`
//!
//! Measures a full recomputation pass over a typical indicator set on the
//! default and accelerated paths, and geometry composition on its own.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::executor::block_on;
use mochart::geometry::{GeometryComposer, PaneLayout};
use mochart::kernels::SoftwareBackend;
use mochart::plan::{IndicatorInstance, Params, Registry, Scheduler};
use mochart::series::Bar;

/// Generate synthetic OHLCV bars.
fn generate_bars(size: usize) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(size);
    let mut price = 100.0;
    for i in 0..size {
        let t = i as f64;
        let open = price;
        price += (t * 0.1).sin() * 2.0 + (t * 0.03).cos() * 1.5;
        price = f64::max(price, 10.0);
        let high = open.max(price) + 1.0 + (t * 0.07).sin().abs();
        let low = open.min(price) - 1.0 - (t * 0.05).cos().abs();
        let volume = 1_000_000.0 + (t * 1000.0).sin() * 500_000.0;
        bars.push(Bar::new(i as i64 * 60_000, open, high, low, price, volume));
    }
    bars
}

fn instances() -> Vec<IndicatorInstance> {
    ["sma", "ema", "bb", "rsi", "macd", "atr", "adx", "volume", "obv", "mfi", "vwap"]
        .into_iter()
        .map(|id| IndicatorInstance::with_id(id, id, Params::new()))
        .collect()
}

// Standard sizes for benchmarking
const SIZES: &[usize] = &[100, 1_000, 10_000];

fn bench_default_path(c: &mut Criterion) {
    let registry = Registry::with_builtins();
    let instances = instances();
    let mut group = c.benchmark_group("compute_default");
    for &size in SIZES {
        let bars = generate_bars(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bars, |b, bars| {
            let scheduler = Scheduler::new(&registry);
            b.iter(|| scheduler.compute_default(black_box(bars), black_box(&instances)));
        });
    }
    group.finish();
}

fn bench_accelerated_path(c: &mut Criterion) {
    let registry = Registry::with_builtins();
    let instances = instances();
    let backend = SoftwareBackend::new();
    let mut group = c.benchmark_group("compute_accelerated");
    for &size in SIZES {
        let bars = generate_bars(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bars, |b, bars| {
            let scheduler = Scheduler::new(&registry);
            b.iter(|| block_on(scheduler.compute_accelerated(black_box(bars), black_box(&instances), &backend)));
        });
    }
    group.finish();
}

fn bench_compose(c: &mut Criterion) {
    let registry = Registry::with_builtins();
    let instances = instances();
    let layout = PaneLayout::default();
    let mut group = c.benchmark_group("compose");
    for &size in SIZES {
        let bars = generate_bars(size);
        let computation = Scheduler::new(&registry).compute_default(&bars, &instances);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bars, |b, bars| {
            let composer = GeometryComposer::new(&layout, 0.01);
            b.iter(|| composer.compose(black_box(bars), &computation, &registry, &[]));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_default_path, bench_accelerated_path, bench_compose);

criterion_main!(benches);
