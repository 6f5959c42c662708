//! Relative Strength Index with Wilder smoothing.
//!
//! The first average gain/loss is the mean over the first `period` close
//! deltas (bars `1..=period`); afterwards
//! `avg = (avg * (period - 1) + new) / period`. A zero average loss maps
//! the relative strength to 100.

use super::{closes, single, PERIOD};
use crate::kernels::KernelId;
use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::params::ParamSpec;
use crate::series::{empty_series, Series};

/// Leading empty samples of an RSI.
#[must_use]
pub const fn rsi_lookback(period: usize) -> usize {
    period
}

/// Computes the RSI of `values`.
///
/// # Arguments
///
/// * `values` - The input series (typically closing prices)
/// * `period` - Smoothing period (commonly 14)
///
/// # Returns
///
/// Values in `0..=100`, empty for the first [`rsi_lookback`]`(period)`
/// samples. Nothing is produced unless `values` is longer than `period`.
///
/// # Example
///
/// ```
/// use mochart::indicators::rsi::rsi;
///
/// let out = rsi(&[44.0, 44.3, 44.1, 44.6, 45.0, 44.8], 3);
/// assert!(out[2].is_none());
/// assert!(out[3..].iter().all(|v| v.is_some_and(|v| (0.0..=100.0).contains(&v))));
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rsi(values: &[f64], period: usize) -> Series {
    let mut out = empty_series(values.len());
    if period == 0 || values.len() <= period {
        return out;
    }
    let p = period as f64;
    let (mut gain, mut loss) = (0.0, 0.0);
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        let (g, l) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        if i <= period {
            gain += g;
            loss += l;
            if i < period {
                continue;
            }
            gain /= p;
            loss /= p;
        } else {
            gain = (gain * (p - 1.0) + g) / p;
            loss = (loss * (p - 1.0) + l) / p;
        }
        out[i] = Some(rsi_value(gain, loss));
    }
    out
}

pub(crate) fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss == 0.0 { 100.0 } else { avg_gain / avg_loss };
    100.0 - 100.0 / (1.0 + rs)
}

/// `rsi` in the sub1 pane with guides at 70, 50 and 30.
pub(crate) fn rsi_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("rsi", "Relative Strength Index", Category::Momentum, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("rsi", rsi(&closes(bars), period)))
    })
    .output(OutputStyle::new("rsi", "#9C27B0", PlotStyle::Line, ZLayer::Line).line_width(1.5))
    .param(PERIOD, ParamSpec::number("Period", 14.0).range(2.0, 50.0).step(1.0))
    .warmup(|p| rsi_lookback(p.period_or(PERIOD, 14)))
    .y_range(0.0, 100.0)
    .horizontal_line(70.0)
    .horizontal_line(30.0)
    .horizontal_line(50.0)
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Rsi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_all_gains() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let out = rsi(&values, 3);
        assert!(out[..3].iter().all(Option::is_none));
        let expected = 100.0 - 100.0 / 101.0;
        assert!((out[3].unwrap() - expected).abs() < 1e-12);
        assert!((out[9].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_all_losses() {
        let values: Vec<f64> = (1..=10).rev().map(f64::from).collect();
        let out = rsi(&values, 3);
        assert_eq!(out[5], Some(0.0));
    }

    #[test]
    fn test_rsi_known_value() {
        // deltas: +1, -1, +2 ; gain 1.0, loss 1/3 ; rs 3 ; rsi 75
        let out = rsi(&[10.0, 11.0, 10.0, 12.0], 3);
        assert!((out[3].unwrap() - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_bounded() {
        let values: Vec<f64> = (0..200).map(|i| 100.0 + (f64::from(i) * 0.7).sin() * 5.0).collect();
        for v in rsi(&values, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn test_rsi_too_short() {
        assert!(rsi(&[1.0, 2.0, 3.0], 3).iter().all(Option::is_none));
    }
}
