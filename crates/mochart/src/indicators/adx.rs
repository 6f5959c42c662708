//! Average Directional Index with +DI and -DI.
//!
//! Directional movement and true range are summed over bars `1..=period`
//! to seed the smoothed values at bar `period`; afterwards each smoothed
//! sum follows `s = s - s / period + x`. ADX is seeded at bar
//! `2 * period - 1` with the mean DX over bars `period..=2 * period - 1`,
//! then Wilder-smoothed.

use super::PERIOD;
use crate::kernels::KernelId;
use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::params::ParamSpec;
use crate::series::{empty_series, Bar, MultiSeriesOutput, Series};

/// Output of [`adx`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdxOutput {
    /// Average directional index.
    pub adx: Series,
    /// Positive directional indicator.
    pub plus_di: Series,
    /// Negative directional indicator.
    pub minus_di: Series,
}

/// Leading empty samples of the ADX line.
#[must_use]
pub const fn adx_lookback(period: usize) -> usize {
    (2 * period).saturating_sub(1)
}

/// Computes ADX, +DI and -DI.
///
/// # Arguments
///
/// * `bars` - The input bars
/// * `period` - Smoothing period (commonly 14)
///
/// # Returns
///
/// An [`AdxOutput`]. The directional indicators start at bar `period`, the
/// ADX line at [`adx_lookback`]`(period)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn adx(bars: &[Bar], period: usize) -> AdxOutput {
    let n = bars.len();
    let mut out = AdxOutput {
        adx: empty_series(n),
        plus_di: empty_series(n),
        minus_di: empty_series(n),
    };
    if period == 0 || n <= period {
        return out;
    }
    let p = period as f64;
    let seed_end = adx_lookback(period);
    let (mut s_tr, mut s_plus, mut s_minus) = (0.0, 0.0, 0.0);
    let mut adx = 0.0;

    for i in 1..n {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = cur.true_range(prev.close);

        if i <= period {
            s_tr += tr;
            s_plus += plus_dm;
            s_minus += minus_dm;
            if i < period {
                continue;
            }
        } else {
            s_tr = s_tr - s_tr / p + tr;
            s_plus = s_plus - s_plus / p + plus_dm;
            s_minus = s_minus - s_minus / p + minus_dm;
        }

        let (plus_di, minus_di) = if s_tr == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
        out.plus_di[i] = Some(plus_di);
        out.minus_di[i] = Some(minus_di);

        if i < seed_end {
            adx += dx;
        } else {
            adx = if i == seed_end {
                (adx + dx) / p
            } else {
                (adx * (p - 1.0) + dx) / p
            };
            out.adx[i] = Some(adx);
        }
    }
    out
}

/// `adx` in the sub1 pane. Outputs: `adx`, `plusDI` and `minusDI`.
pub(crate) fn adx_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("adx", "Average Directional Index", Category::Trend, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        let out = adx(bars, period);
        Ok(MultiSeriesOutput::new()
            .with("adx", out.adx)
            .with("plusDI", out.plus_di)
            .with("minusDI", out.minus_di))
    })
    .output(OutputStyle::new("adx", "#FF5722", PlotStyle::Line, ZLayer::Line).line_width(2.0))
    .output(OutputStyle::new("plusDI", "#4CAF50", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("minusDI", "#F44336", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .param(PERIOD, ParamSpec::number("Period", 14.0).range(5.0, 50.0).step(1.0))
    .warmup(|p| adx_lookback(p.period_or(PERIOD, 14)))
    .y_range(0.0, 100.0)
    .horizontal_line(25.0)
    .horizontal_line(50.0)
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Adx)
}
