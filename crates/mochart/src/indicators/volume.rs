//! Volume and money-flow indicators.
//!
//! Every rolling sum here is maintained in O(n) by adding the entering
//! sample and subtracting the one leaving the window.

use super::window::trailing_mean;
use super::{single, volumes, PERIOD};
use crate::kernels::KernelId;
use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::plan::params::ParamSpec;
use crate::series::{empty_series, Bar, MultiSeriesOutput, Series};

/// Leading empty samples of the trailing-window volume indicators
/// (`cmf`, `vwap`, `vol_ratio`).
#[must_use]
pub const fn window_lookback(period: usize) -> usize {
    period.saturating_sub(1)
}

/// Leading empty samples of MFI.
#[must_use]
pub const fn mfi_lookback(period: usize) -> usize {
    period
}

/// On-balance volume: `None` at bar 0, then a running total starting from
/// zero that adds volume on up closes and subtracts it on down closes.
///
/// # Example
///
/// ```
/// use mochart::indicators::volume::obv;
/// use mochart::series::Bar;
///
/// let bars = [
///     Bar::new(0, 10.0, 10.0, 10.0, 10.0, 100.0),
///     Bar::new(1, 11.0, 11.0, 11.0, 11.0, 200.0),
///     Bar::new(2, 10.5, 10.5, 10.5, 10.5, 50.0),
///     Bar::new(3, 10.5, 10.5, 10.5, 10.5, 70.0),
/// ];
/// assert_eq!(obv(&bars), vec![None, Some(200.0), Some(150.0), Some(150.0)]);
/// ```
#[must_use]
pub fn obv(bars: &[Bar]) -> Series {
    let mut out = empty_series(bars.len());
    let mut total = 0.0;
    for i in 1..bars.len() {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        if cur.close > prev.close {
            total += cur.volume;
        } else if cur.close < prev.close {
            total -= cur.volume;
        }
        out[i] = Some(total);
    }
    out
}

/// Chaikin money flow: `sum(mfm * volume) / sum(volume)` over the window,
/// `None` when the volume sum is zero.
///
/// # Arguments
///
/// * `bars` - The input bars
/// * `period` - Window length (commonly 21)
///
/// # Returns
///
/// Values in `-1..=1`, empty for the first [`window_lookback`]`(period)`
/// bars. A bar with zero range contributes no flow.
#[must_use]
pub fn cmf(bars: &[Bar], period: usize) -> Series {
    let mut out = empty_series(bars.len());
    if period == 0 {
        return out;
    }
    let flow = |b: &Bar| {
        let range = b.high - b.low;
        let mfm = if range == 0.0 {
            0.0
        } else {
            ((b.close - b.low) - (b.high - b.close)) / range
        };
        mfm * b.volume
    };
    let (mut flow_sum, mut vol_sum) = (0.0, 0.0);
    for i in 0..bars.len() {
        flow_sum += flow(&bars[i]);
        vol_sum += bars[i].volume;
        if i >= period {
            flow_sum -= flow(&bars[i - period]);
            vol_sum -= bars[i - period].volume;
        }
        if i + 1 >= period && vol_sum != 0.0 {
            out[i] = Some(flow_sum / vol_sum);
        }
    }
    out
}

/// Money flow index over the last `period` typical-price flows.
///
/// # Arguments
///
/// * `bars` - The input bars
/// * `period` - Number of flows in the window (commonly 14)
///
/// # Returns
///
/// Values in `0..=100`, empty for the first [`mfi_lookback`]`(period)` bars.
#[must_use]
pub fn mfi(bars: &[Bar], period: usize) -> Series {
    let mut out = empty_series(bars.len());
    if period == 0 {
        return out;
    }
    // Signed flow of bar `j` (j >= 1): positive when typical price rose.
    let flow = |j: usize| {
        let tp = bars[j].typical_price();
        let prev = bars[j - 1].typical_price();
        let raw = tp * bars[j].volume;
        if tp > prev {
            (raw, 0.0)
        } else if tp < prev {
            (0.0, raw)
        } else {
            (0.0, 0.0)
        }
    };
    let (mut pos, mut neg) = (0.0, 0.0);
    for i in 1..bars.len() {
        let (p, n) = flow(i);
        pos += p;
        neg += n;
        if i > period {
            let (p, n) = flow(i - period);
            pos -= p;
            neg -= n;
        }
        if i >= period {
            let ratio = if neg == 0.0 { 100.0 } else { pos / neg };
            out[i] = Some(100.0 - 100.0 / (1.0 + ratio));
        }
    }
    out
}

/// Rolling volume-weighted average of typical price, `None` when the
/// window holds no volume.
///
/// # Arguments
///
/// * `bars` - The input bars
/// * `period` - Window length (commonly 20)
#[must_use]
pub fn vwap(bars: &[Bar], period: usize) -> Series {
    let mut out = empty_series(bars.len());
    if period == 0 {
        return out;
    }
    let (mut pv, mut v) = (0.0, 0.0);
    for i in 0..bars.len() {
        pv += bars[i].typical_price() * bars[i].volume;
        v += bars[i].volume;
        if i >= period {
            let old = &bars[i - period];
            pv -= old.typical_price() * old.volume;
            v -= old.volume;
        }
        if i + 1 >= period && v != 0.0 {
            out[i] = Some(pv / v);
        }
    }
    out
}

/// Volume over its trailing mean; 0 when the mean is 0.
///
/// # Returns
///
/// A series empty for the first [`window_lookback`]`(period)` bars.
#[must_use]
pub fn volume_ratio(bars: &[Bar], period: usize) -> Series {
    let vols = volumes(bars);
    trailing_mean(&vols, period)
        .into_iter()
        .zip(&vols)
        .map(|(avg, &v)| avg.map(|avg| if avg == 0.0 { 0.0 } else { v / avg }))
        .collect()
}

pub(crate) fn volume_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("volume", "Volume", Category::Volume, Pane::Sub1, |bars, params| {
        let period = params.period("maPeriod")?;
        let vols = volumes(bars);
        let ma = trailing_mean(&vols, period);
        Ok(MultiSeriesOutput::new()
            .with("volume", vols.into_iter().map(Some).collect())
            .with("volumeMA", ma))
    })
    .output(OutputStyle::new("volume", "#90CAF9", PlotStyle::Bar, ZLayer::Histogram).opacity(0.8))
    .output(OutputStyle::new("volumeMA", "#1565C0", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .param("maPeriod", ParamSpec::number("MA Period", 20.0).range(5.0, 50.0).step(1.0))
    .complexity(Cost::Linear, Cost::Linear)
}

pub(crate) fn obv_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("obv", "On-Balance Volume", Category::Volume, Pane::Sub1, |bars, _| {
        Ok(single("obv", obv(bars)))
    })
    .output(OutputStyle::new("obv", "#3F51B5", PlotStyle::Line, ZLayer::Line).line_width(1.2))
    .warmup(|_| 1)
    .complexity(Cost::Linear, Cost::Linear)
}

/// `cmf` in the sub1 pane. Parameter: `period` (21, 2..=200).
pub(crate) fn cmf_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("cmf", "Chaikin Money Flow", Category::Volume, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("cmf", cmf(bars, period)))
    })
    .output(OutputStyle::new("cmf", "#8BC34A", PlotStyle::Line, ZLayer::Line).line_width(1.2))
    .param(PERIOD, ParamSpec::number("Period", 21.0).range(2.0, 200.0).step(1.0))
    .warmup(|p| window_lookback(p.period_or(PERIOD, 21)))
    .horizontal_line(0.0)
    .complexity(Cost::Linear, Cost::Linear)
}

/// `mfi` in the sub1 pane with guides at 80 and 20. Parameter: `period`
/// (14, 2..=200).
pub(crate) fn mfi_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("mfi", "Money Flow Index", Category::Volume, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("mfi", mfi(bars, period)))
    })
    .output(OutputStyle::new("mfi", "#FF7043", PlotStyle::Line, ZLayer::Line).line_width(1.2))
    .param(PERIOD, ParamSpec::number("Period", 14.0).range(2.0, 200.0).step(1.0))
    .warmup(|p| mfi_lookback(p.period_or(PERIOD, 14)))
    .y_range(0.0, 100.0)
    .horizontal_line(80.0)
    .horizontal_line(20.0)
    .complexity(Cost::Linear, Cost::Linear)
}

pub(crate) fn vwap_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("vwap", "Rolling VWAP", Category::Volume, Pane::Main, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("vwap", vwap(bars, period)))
    })
    .output(OutputStyle::new("vwap", "#6D4C41", PlotStyle::Line, ZLayer::Line).line_width(1.5))
    .param(PERIOD, ParamSpec::number("Period", 20.0).range(2.0, 200.0).step(1.0))
    .warmup(|p| window_lookback(p.period_or(PERIOD, 20)))
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::Vwap)
}

pub(crate) fn vol_ratio_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("vol_ratio", "Volume Ratio", Category::Volume, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("volRatio", volume_ratio(bars, period)))
    })
    .output(OutputStyle::new("volRatio", "#00897B", PlotStyle::Line, ZLayer::Line).line_width(1.2))
    .param(PERIOD, ParamSpec::number("Period", 20.0).range(2.0, 200.0).step(1.0))
    .warmup(|p| window_lookback(p.period_or(PERIOD, 20)))
    .horizontal_line(1.0)
    .complexity(Cost::Linear, Cost::Linear)
    .kernel(KernelId::VolRatio)
}
