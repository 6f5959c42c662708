//! Simple and exponential moving averages of close.
//!
//! # Example
//!
//! ```
//! use mochart::indicators::moving_average::sma;
//!
//! let closes: Vec<f64> = (100..110).map(f64::from).collect();
//! let out = sma(&closes, 5);
//! assert_eq!(out[3], None);
//! assert_eq!(out[4], Some(102.0));
//! assert_eq!(out[9], Some(107.0));
//! ```

use super::window::{ema_seeded, mask_prefix, trailing_mean};
use super::{closes, single, PERIOD};
use crate::kernels::KernelId;
use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::params::ParamSpec;
use crate::series::Series;

/// Leading empty samples of an SMA.
#[must_use]
pub const fn sma_lookback(period: usize) -> usize {
    period.saturating_sub(1)
}

/// Leading empty samples of an EMA.
#[must_use]
pub const fn ema_lookback(period: usize) -> usize {
    period.saturating_sub(1)
}

/// Simple moving average.
///
/// # Arguments
///
/// * `values` - The input series
/// * `period` - Window length
///
/// # Returns
///
/// A series as long as `values`, empty for the first
/// [`sma_lookback`]`(period)` samples and entirely empty when `period` is 0
/// or longer than the input.
#[must_use]
pub fn sma(values: &[f64], period: usize) -> Series {
    trailing_mean(values, period)
}

/// Exponential moving average with `k = 2 / (period + 1)`, seeded with the
/// first value. The recursion starts at bar 0; the first `period - 1`
/// samples are reported as `None`.
///
/// # Example
///
/// ```
/// use mochart::indicators::moving_average::ema;
///
/// let out = ema(&[10.0, 10.0, 10.0, 20.0], 3);
/// assert_eq!(out[1], None);
/// assert_eq!(out[2], Some(10.0));
/// assert_eq!(out[3], Some(15.0));
/// ```
#[must_use]
pub fn ema(values: &[f64], period: usize) -> Series {
    let mut out: Series = ema_seeded(values, period).into_iter().map(Some).collect();
    mask_prefix(&mut out, ema_lookback(period));
    out
}

/// `sma` on the main pane. Parameter: `period` (20, 2..=200).
pub(crate) fn sma_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("sma", "Simple Moving Average", Category::Trend, Pane::Main, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("sma", sma(&closes(bars), period)))
    })
    .output(OutputStyle::new("sma", "#4ECDC4", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .param(PERIOD, ParamSpec::number("Period", 20.0).range(2.0, 200.0).step(1.0))
    .warmup(|p| sma_lookback(p.period_or(PERIOD, 20)))
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Sma)
}

pub(crate) fn ema_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("ema", "Exponential Moving Average", Category::Trend, Pane::Main, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("ema", ema(&closes(bars), period)))
    })
    .output(OutputStyle::new("ema", "#FFB703", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .param(PERIOD, ParamSpec::number("Period", 20.0).range(2.0, 200.0).step(1.0))
    .warmup(|p| ema_lookback(p.period_or(PERIOD, 20)))
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Ema)
}
