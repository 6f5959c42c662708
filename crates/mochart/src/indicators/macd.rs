//! Moving Average Convergence Divergence.
//!
//! Both EMAs of close and the signal EMA of the MACD line are seeded at
//! bar 0. All three outputs are reported from bar `slow + signal - 1`.
//!
//! MACD declares a dependency on `ema` so schedulers order it after any
//! EMA instance, but it recomputes its own averages.

use super::window::{ema_seeded, mask_prefix};
use super::closes;
use crate::kernels::KernelId;
use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::params::ParamSpec;
use crate::series::{MultiSeriesOutput, Series};

/// Output of [`macd`].
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    /// Fast EMA minus slow EMA.
    pub macd: Series,
    /// EMA of the MACD line.
    pub signal: Series,
    /// MACD minus signal.
    pub histogram: Series,
}

/// Leading empty samples of every MACD output.
#[must_use]
pub const fn macd_lookback(slow: usize, signal: usize) -> usize {
    (slow + signal).saturating_sub(1)
}

/// Computes MACD over `values`.
///
/// # Arguments
///
/// * `values` - The input series (typically closing prices)
/// * `fast` - Period of the fast EMA (commonly 12)
/// * `slow` - Period of the slow EMA (commonly 26)
/// * `signal` - Period of the signal EMA over the MACD line (commonly 9)
///
/// # Returns
///
/// A [`MacdOutput`] whose three series are as long as `values` and empty
/// for the first [`macd_lookback`]`(slow, signal)` samples.
///
/// # Example
///
/// ```
/// use mochart::indicators::macd::{macd, macd_lookback};
///
/// let values: Vec<f64> = (0..60).map(f64::from).collect();
/// let out = macd(&values, 12, 26, 9);
/// assert!(out.macd[macd_lookback(26, 9) - 1].is_none());
/// assert!(out.macd[59].unwrap() > 0.0);
/// ```
#[must_use]
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    let ema_fast = ema_seeded(values, fast);
    let ema_slow = ema_seeded(values, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let sig = ema_seeded(&line, signal);

    let mut out = MacdOutput {
        macd: line.iter().copied().map(Some).collect(),
        signal: sig.iter().copied().map(Some).collect(),
        histogram: line.iter().zip(&sig).map(|(m, s)| Some(m - s)).collect(),
    };
    let lookback = macd_lookback(slow, signal);
    mask_prefix(&mut out.macd, lookback);
    mask_prefix(&mut out.signal, lookback);
    mask_prefix(&mut out.histogram, lookback);
    out
}

/// Fast EMA period parameter of the `macd` definition.
pub const FAST_PERIOD: &str = "fastPeriod";
/// Slow EMA period parameter.
pub const SLOW_PERIOD: &str = "slowPeriod";
/// Signal EMA period parameter.
pub const SIGNAL_PERIOD: &str = "signalPeriod";

/// `macd` in the sub2 pane.
///
/// Parameters: `fastPeriod` (12, 2..=50), `slowPeriod` (26, 5..=100) and
/// `signalPeriod` (9, 2..=50). Outputs: `macd`, `signal` and `histogram`.
pub(crate) fn macd_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("macd", "MACD", Category::Momentum, Pane::Sub2, |bars, params| {
        let fast = params.period(FAST_PERIOD)?;
        let slow = params.period(SLOW_PERIOD)?;
        let signal = params.period(SIGNAL_PERIOD)?;
        let out = macd(&closes(bars), fast, slow, signal);
        Ok(MultiSeriesOutput::new()
            .with("macd", out.macd)
            .with("signal", out.signal)
            .with("histogram", out.histogram))
    })
    .output(OutputStyle::new("macd", "#2196F3", PlotStyle::Line, ZLayer::Line).line_width(1.5))
    .output(OutputStyle::new("signal", "#FF9800", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("histogram", "#4CAF50", PlotStyle::Histogram, ZLayer::Histogram).opacity(0.7))
    .param(FAST_PERIOD, ParamSpec::number("Fast Period", 12.0).range(2.0, 50.0).step(1.0))
    .param(SLOW_PERIOD, ParamSpec::number("Slow Period", 26.0).range(5.0, 100.0).step(1.0))
    .param(SIGNAL_PERIOD, ParamSpec::number("Signal Period", 9.0).range(2.0, 50.0).step(1.0))
    .depends_on("ema")
    .warmup(|p| macd_lookback(p.period_or(SLOW_PERIOD, 26), p.period_or(SIGNAL_PERIOD, 9)))
    .horizontal_line(0.0)
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Macd)
}
