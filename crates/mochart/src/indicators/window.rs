//! Trailing-window primitives shared by the default-path formulas.
//!
//! The helpers are generic over [`num_traits::Float`] and operate on plain
//! slices; callers extract the bar field they need first.

use num_traits::{Float, NumCast};

/// Trailing mean over `period` values, maintained with an add/remove
/// running sum. `None` until the window is full.
#[must_use]
pub fn trailing_mean<T: Float>(values: &[T], period: usize) -> Vec<Option<T>> {
    let mut out = vec![None; values.len()];
    let Some(n) = <T as NumCast>::from(period).filter(|_| period > 0) else {
        return out;
    };
    let mut sum = T::zero();
    for (i, &v) in values.iter().enumerate() {
        sum = sum + v;
        if i >= period {
            sum = sum - values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / n);
        }
    }
    out
}

/// Mean and population standard deviation of a full window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats<T> {
    /// Window mean.
    pub mean: T,
    /// Population standard deviation.
    pub std_dev: T,
}

impl<T: Float> WindowStats<T> {
    /// `(upper, lower)` at `k` standard deviations.
    #[must_use]
    pub fn bands(&self, k: T) -> (T, T) {
        (self.mean + k * self.std_dev, self.mean - k * self.std_dev)
    }
}

/// Trailing mean and population standard deviation.
///
/// Both are computed per window, relative to the window's first value, so
/// a flat window yields exactly its value and a zero deviation.
#[must_use]
pub fn trailing_stats<T: Float>(values: &[T], period: usize) -> Vec<Option<WindowStats<T>>> {
    let mut out = vec![None; values.len()];
    let Some(n) = <T as NumCast>::from(period).filter(|_| period > 0) else {
        return out;
    };
    for (i, slot) in out.iter_mut().enumerate().skip(period - 1) {
        let window = &values[i + 1 - period..=i];
        let base = window[0];
        let mean = base + window.iter().fold(T::zero(), |acc, &v| acc + (v - base)) / n;
        let var = window
            .iter()
            .fold(T::zero(), |acc, &v| acc + (v - mean) * (v - mean))
            / n;
        *slot = Some(WindowStats {
            mean,
            std_dev: var.sqrt(),
        });
    }
    out
}

/// Exponential moving average seeded with the first value, undefined
/// prefix included. Returns an empty vector for empty input.
#[must_use]
pub fn ema_seeded<T: Float>(values: &[T], period: usize) -> Vec<T> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let two = T::one() + T::one();
    let k = <T as NumCast>::from(period).map_or_else(T::one, |p| two / (p + T::one()));
    let mut out = Vec::with_capacity(values.len());
    let mut prev = first;
    out.push(prev);
    for &v in &values[1..] {
        prev = v * k + prev * (T::one() - k);
        out.push(prev);
    }
    out
}

/// Sets every entry before `count` to `None`.
pub fn mask_prefix<T>(series: &mut [Option<T>], count: usize) {
    let end = count.min(series.len());
    for v in &mut series[..end] {
        *v = None;
    }
}
