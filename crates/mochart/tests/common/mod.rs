//! Shared test utilities for mochart tests.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mochart::series::Bar;

/// Fixed seed for reproducible bar generation.
#[allow(dead_code)]
pub const SEED: u64 = 0x00C4_A127_2026;

/// Standard epsilon for high-precision comparisons.
#[allow(dead_code)]
pub const EPSILON: f64 = 1e-10;

/// Looser epsilon for comparisons involving accumulated floating-point operations.
#[allow(dead_code)]
pub const LOOSE_EPSILON: f64 = 1e-6;

/// One minute in milliseconds, the bar spacing used by the generators.
#[allow(dead_code)]
pub const MINUTE_MS: i64 = 60_000;

/// Approximate equality check for floating-point values.
#[allow(dead_code)]
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() < eps
}

/// Relative comparison used between the default path and `f32` kernels.
#[allow(dead_code)]
pub fn approx_eq_relative(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * a.abs().max(1.0)
}

/// Random walk OHLCV bars with `high >= max(open, close)` and
/// `low <= min(open, close)`.
#[allow(dead_code)]
pub fn random_bars(seed: u64, count: usize) -> Vec<Bar> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut price = 100.0_f64;
    let mut bars = Vec::with_capacity(count);
    for i in 0..count {
        let open = price;
        let change = rng.gen_range(-0.02..0.02) * price;
        let close = (price + change).max(1.0);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(1_000.0..50_000.0);
        bars.push(Bar::new(i as i64 * MINUTE_MS, open, high, low, close, volume));
        price = close;
    }
    bars
}

/// Bars whose close follows `closes`, with a fixed one-unit range.
#[allow(dead_code)]
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(i as i64 * MINUTE_MS, c, c + 1.0, c - 1.0, c, 1_000.0))
        .collect()
}

/// Bars with identical prices.
#[allow(dead_code)]
pub fn flat_bars(price: f64, count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| Bar::new(i as i64 * MINUTE_MS, price, price, price, price, 1_000.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bars_are_consistent() {
        let bars = random_bars(SEED, 200);
        assert_eq!(bars.len(), 200);
        for bar in &bars {
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
        }
        assert_eq!(random_bars(SEED, 10), random_bars(SEED, 10));
    }
}
