//! Average True Range.

use super::{single, PERIOD};
use crate::kernels::KernelId;
use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::params::ParamSpec;
use crate::series::{empty_series, Bar, Series};

/// Leading empty samples of an ATR.
#[must_use]
pub const fn atr_lookback(period: usize) -> usize {
    period
}

/// Computes the ATR.
///
/// True range starts at bar 1. `atr[period]` is the mean true range over
/// bars `1..=period`; later samples use Wilder smoothing.
///
/// # Arguments
///
/// * `bars` - The input bars
/// * `period` - Smoothing period (commonly 14)
///
/// # Returns
///
/// A series empty through bar `period - 1`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn atr(bars: &[Bar], period: usize) -> Series {
    let mut out = empty_series(bars.len());
    if period == 0 || bars.len() <= period {
        return out;
    }
    let p = period as f64;
    let mut value = 0.0;
    for i in 1..bars.len() {
        let tr = bars[i].true_range(bars[i - 1].close);
        if i < period {
            value += tr;
            continue;
        }
        value = if i == period {
            (value + tr) / p
        } else {
            (value * (p - 1.0) + tr) / p
        };
        out[i] = Some(value);
    }
    out
}

pub(crate) fn atr_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("atr", "Average True Range", Category::Volatility, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("atr", atr(bars, period)))
    })
    .output(OutputStyle::new("atr", "#795548", PlotStyle::Line, ZLayer::Line).line_width(1.5))
    .param(PERIOD, ParamSpec::number("Period", 14.0).range(5.0, 50.0).step(1.0))
    .warmup(|p| atr_lookback(p.period_or(PERIOD, 14)))
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Atr)
}
