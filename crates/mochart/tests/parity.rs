//! Default path versus accelerated path.
//!
//! Every kernel is run through the scheduler twice over the same bars, once
//! synchronously in `f64` and once through the single-precision
//! [`SoftwareBackend`], and the non-null samples are compared.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

mod common;

use futures::executor::block_on;

use common::{approx_eq_relative, bars_from_closes, random_bars, SEED};
use mochart::kernels::{AcceleratedBackend, KernelId, KernelRequest, SoftwareBackend};
use mochart::plan::{IndicatorInstance, Params, Registry, Scheduler};
use mochart::series::{count_leading_none, Bar};
use mochart::{ErrorKind, Result};

/// Relative tolerance between `f64` formulas and `f32` kernels.
const PARITY_TOLERANCE: f64 = 1e-3;

/// ADX compares directional moves, which can round differently in `f32`.
const ADX_TOLERANCE: f64 = 1e-2;

fn assert_parity(registry: &Registry, bars: &[Bar], instance: &IndicatorInstance, tolerance: f64) {
    let scheduler = Scheduler::new(registry);
    let instances = std::slice::from_ref(instance);
    let default = scheduler.compute_default(bars, instances);
    let accelerated = block_on(scheduler.compute_accelerated(bars, instances, &SoftwareBackend::new()));

    let expected = default.get(&instance.instance_id).unwrap().output().unwrap();
    let actual = accelerated.get(&instance.instance_id).unwrap().output().unwrap();

    let def = registry.get(&instance.definition_id).unwrap();
    let mut compared = 0;
    for style in def.outputs() {
        let e = expected.get(&style.name).unwrap();
        let a = actual.get(&style.name).unwrap();
        assert_eq!(e.len(), a.len(), "{}.{} length", def.id(), style.name);
        assert_eq!(
            count_leading_none(e),
            count_leading_none(a),
            "{}.{} warmup",
            def.id(),
            style.name
        );
        for (i, (x, y)) in e.iter().zip(a).enumerate() {
            if let (Some(x), Some(y)) = (x, y) {
                assert!(
                    approx_eq_relative(*x, *y, tolerance),
                    "{}.{}[{}]: default {} vs accelerated {}",
                    def.id(),
                    style.name,
                    i,
                    x,
                    y
                );
                compared += 1;
            }
        }
    }
    assert!(compared > 0, "{} compared no samples", def.id());
}

#[test]
fn test_every_kernel_matches_default_path() {
    let registry = Registry::with_builtins();
    let bars = random_bars(SEED, 400);
    for kernel in KernelId::ALL {
        let instance = IndicatorInstance::with_id(kernel.indicator_id(), "parity", Params::new());
        let tolerance = if kernel == KernelId::Adx {
            ADX_TOLERANCE
        } else {
            PARITY_TOLERANCE
        };
        assert_parity(&registry, &bars, &instance, tolerance);
    }
}

#[test]
fn test_parity_with_non_default_params() {
    let registry = Registry::with_builtins();
    let bars = random_bars(SEED + 1, 300);
    let cases = [
        ("sma", Params::new().with("period", 7)),
        ("ema", Params::new().with("period", 30)),
        ("rsi", Params::new().with("period", 5)),
        ("bb", Params::new().with("period", 10).with("stdDev", 1.5)),
        ("percent_b", Params::new().with("period", 12).with("stdDev", 2.5)),
        (
            "macd",
            Params::new()
                .with("fastPeriod", 5)
                .with("slowPeriod", 13)
                .with("signalPeriod", 4),
        ),
        ("atr", Params::new().with("period", 21)),
        ("vwap", Params::new().with("period", 50)),
    ];
    for (id, params) in cases {
        let instance = IndicatorInstance::with_id(id, "custom", params);
        assert_parity(&registry, &bars, &instance, PARITY_TOLERANCE);
    }
}

#[test]
fn test_macd_fast_period_reaches_both_paths() {
    let registry = Registry::with_builtins();
    let bars = random_bars(SEED, 200);
    let instances = [
        IndicatorInstance::with_id("macd", "default", Params::new()),
        IndicatorInstance::with_id("macd", "fast", Params::new().with("fastPeriod", 5)),
    ];
    let scheduler = Scheduler::new(&registry);
    let default = scheduler.compute_default(&bars, &instances);
    let accelerated = block_on(scheduler.compute_accelerated(&bars, &instances, &SoftwareBackend::new()));
    for computation in [&default, &accelerated] {
        let line = |id: &str| computation.get(id).unwrap().output().unwrap().get("macd").unwrap().clone();
        let (base, fast) = (line("default"), line("fast"));
        assert_eq!(count_leading_none(&base), count_leading_none(&fast));
        let last = bars.len() - 1;
        assert!((base[last].unwrap() - fast[last].unwrap()).abs() > 1e-6);
    }
}

#[test]
fn test_sma_example_on_both_paths() {
    let registry = Registry::with_builtins();
    let closes: Vec<f64> = (100..110).map(f64::from).collect();
    let bars = bars_from_closes(&closes);
    let instance = IndicatorInstance::with_id("sma", "s", Params::new().with("period", 5));
    let scheduler = Scheduler::new(&registry);

    let default = scheduler.compute_default(&bars, std::slice::from_ref(&instance));
    let accelerated = block_on(scheduler.compute_accelerated(
        &bars,
        std::slice::from_ref(&instance),
        &SoftwareBackend::new(),
    ));
    for computation in [&default, &accelerated] {
        let sma = computation.get("s").unwrap().output().unwrap().get("sma").unwrap();
        assert!(sma[..4].iter().all(Option::is_none));
        assert_eq!(sma[4], Some(102.0));
        assert_eq!(sma[5], Some(103.0));
        assert_eq!(sma[9], Some(107.0));
    }
}

#[test]
fn test_kernel_less_instances_use_default_path() {
    let registry = Registry::with_builtins();
    let bars = random_bars(SEED, 60);
    let instances = [
        IndicatorInstance::with_id("obv", "obv", Params::new()),
        IndicatorInstance::with_id("pivot_points", "pp", Params::new()),
    ];
    let scheduler = Scheduler::new(&registry);
    let default = scheduler.compute_default(&bars, &instances);
    let accelerated = block_on(scheduler.compute_accelerated(&bars, &instances, &SoftwareBackend::new()));
    assert_eq!(default, accelerated);
}

/// Returns buffers one slot short.
struct TruncatingBackend;

#[async_trait::async_trait]
impl AcceleratedBackend for TruncatingBackend {
    fn name(&self) -> &str {
        "truncating"
    }

    async fn dispatch(&self, request: KernelRequest<'_>) -> Result<Vec<f32>> {
        let mut out = SoftwareBackend::new().dispatch(request).await?;
        out.pop();
        Ok(out)
    }
}

#[test]
fn test_malformed_backend_output_is_isolated() {
    let registry = Registry::with_builtins();
    let bars = random_bars(SEED, 60);
    let instances = [
        IndicatorInstance::with_id("rsi", "rsi", Params::new()),
        IndicatorInstance::with_id("obv", "obv", Params::new()),
    ];
    let computation =
        block_on(Scheduler::new(&registry).compute_accelerated(&bars, &instances, &TruncatingBackend));
    assert_eq!(
        computation.get("rsi").unwrap().result.as_ref().unwrap_err().kind(),
        ErrorKind::AcceleratedPath
    );
    assert!(computation.get("obv").unwrap().result.is_ok());
}
