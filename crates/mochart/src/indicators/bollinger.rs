//! Bollinger bands and the two indicators derived from them.
//!
//! All three use a trailing mean and the *population* standard deviation
//! (divide by `period`) of close.
//!
//! - `bb`: upper, middle, lower and a `fill` band series (equal to upper,
//!   filled towards lower).
//! - `percent_b`: `(close - lower) / (upper - lower)`, 0.5 for zero width.
//! - `bb_width`: `(upper - lower) / middle`, 0 unless the middle band is
//!   positive.

use super::window::trailing_stats;
use super::{closes, single, PERIOD, STD_DEV};
use crate::kernels::KernelId;
use crate::plan::definition::{
    Category, Cost, FillTo, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer,
};
use crate::plan::params::ParamSpec;
use crate::series::{MultiSeriesOutput, Series};

/// Output of [`bollinger`].
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerOutput {
    /// Mean plus `k` deviations.
    pub upper: Series,
    /// Trailing mean.
    pub middle: Series,
    /// Mean minus `k` deviations.
    pub lower: Series,
}

/// Leading empty samples of every band indicator.
#[must_use]
pub const fn bollinger_lookback(period: usize) -> usize {
    period.saturating_sub(1)
}

/// Computes Bollinger bands at `k` standard deviations.
///
/// # Arguments
///
/// * `values` - The input series (typically closing prices)
/// * `period` - Window length of the mean and deviation (commonly 20)
/// * `k` - Number of standard deviations for the outer bands (commonly 2.0)
///
/// # Returns
///
/// A [`BollingerOutput`] whose bands are empty for the first
/// [`bollinger_lookback`]`(period)` samples.
///
/// # Example
///
/// ```
/// use mochart::indicators::bollinger::bollinger;
///
/// let out = bollinger(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, 2.0);
/// assert_eq!(out.middle[7], Some(5.0));
/// assert_eq!(out.upper[7], Some(9.0));
/// assert_eq!(out.lower[7], Some(1.0));
/// assert!(out.middle[6].is_none());
/// ```
#[must_use]
pub fn bollinger(values: &[f64], period: usize, k: f64) -> BollingerOutput {
    let stats = trailing_stats(values, period);
    let mut out = BollingerOutput {
        upper: Vec::with_capacity(values.len()),
        middle: Vec::with_capacity(values.len()),
        lower: Vec::with_capacity(values.len()),
    };
    for s in stats {
        let bands = s.map(|s| (s.bands(k), s.mean));
        out.upper.push(bands.map(|((u, _), _)| u));
        out.middle.push(bands.map(|(_, m)| m));
        out.lower.push(bands.map(|((_, l), _)| l));
    }
    out
}

/// Position of each value inside its bands: 0 on the lower band, 1 on the
/// upper band, 0.5 when the bands have zero width.
///
/// # Example
///
/// ```
/// use mochart::indicators::bollinger::percent_b;
///
/// let out = percent_b(&[100.1; 30], 20, 2.0);
/// assert_eq!(out[18], None);
/// assert!(out[19..].iter().all(|v| *v == Some(0.5)));
/// ```
#[must_use]
pub fn percent_b(values: &[f64], period: usize, k: f64) -> Series {
    let bands = bollinger(values, period, k);
    values
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let (upper, lower) = (bands.upper[i]?, bands.lower[i]?);
            let width = upper - lower;
            Some(if width == 0.0 { 0.5 } else { (close - lower) / width })
        })
        .collect()
}

/// Band width relative to the middle band, `(upper - lower) / middle`.
///
/// # Returns
///
/// A series empty for the warmup, then the width ratio, or 0 wherever the
/// middle band is zero or negative.
#[must_use]
pub fn bandwidth(values: &[f64], period: usize, k: f64) -> Series {
    let bands = bollinger(values, period, k);
    (0..values.len())
        .map(|i| {
            let (upper, middle, lower) = (bands.upper[i]?, bands.middle[i]?, bands.lower[i]?);
            Some(width_ratio(upper, lower, middle))
        })
        .collect()
}

pub(crate) fn width_ratio(upper: f64, lower: f64, middle: f64) -> f64 {
    if middle > 0.0 {
        (upper - lower) / middle
    } else {
        0.0
    }
}

fn band_params(def: IndicatorDefinition) -> IndicatorDefinition {
    def.param(PERIOD, ParamSpec::number("Period", 20.0).range(5.0, 100.0).step(1.0))
        .param(
            STD_DEV,
            ParamSpec::number("Std Dev", 2.0).range(0.5, 4.0).step(0.1),
        )
        .warmup(|p| bollinger_lookback(p.period_or(PERIOD, 20)))
        .complexity(Cost::Windowed, Cost::Linear)
}

/// `bb` on the main pane.
///
/// Parameters: `period` (20, 5..=100) and `stdDev` (2.0, 0.5..=4.0).
/// Outputs: `upper`, `middle`, `lower` and the `fill` band between upper
/// and lower.
pub(crate) fn bb_definition() -> IndicatorDefinition {
    let def = IndicatorDefinition::new("bb", "Bollinger Bands", Category::Volatility, Pane::Main, |bars, params| {
        let period = params.period(PERIOD)?;
        let k = params.number(STD_DEV)?;
        let bands = bollinger(&closes(bars), period, k);
        Ok(MultiSeriesOutput::new()
            .with("fill", bands.upper.clone())
            .with("upper", bands.upper)
            .with("middle", bands.middle)
            .with("lower", bands.lower))
    })
    .output(OutputStyle::new("upper", "#2196F3", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("middle", "#9E9E9E", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("lower", "#2196F3", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(
        OutputStyle::new("fill", "rgba(33,150,243,0.1)", PlotStyle::Band, ZLayer::Fill)
            .fill_to(FillTo::Output("lower".into())),
    );
    band_params(def).kernel(KernelId::Bollinger)
}

/// `percent_b` in the sub1 pane, with the band parameters of `bb`.
pub(crate) fn percent_b_definition() -> IndicatorDefinition {
    let def = IndicatorDefinition::new("percent_b", "Bollinger %B", Category::Volatility, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        let k = params.number(STD_DEV)?;
        Ok(single("percentB", percent_b(&closes(bars), period, k)))
    })
    .output(OutputStyle::new("percentB", "#673AB7", PlotStyle::Line, ZLayer::Line).line_width(1.3))
    .horizontal_line(1.0)
    .horizontal_line(0.5)
    .horizontal_line(0.0);
    band_params(def).kernel(KernelId::PercentB)
}

pub(crate) fn bb_width_definition() -> IndicatorDefinition {
    let def = IndicatorDefinition::new("bb_width", "Bollinger Bandwidth", Category::Volatility, Pane::Sub1, |bars, params| {
        let period = params.period(PERIOD)?;
        let k = params.number(STD_DEV)?;
        Ok(single("width", bandwidth(&closes(bars), period, k)))
    })
    .output(
        OutputStyle::new("width", "#00BCD4", PlotStyle::Area, ZLayer::Histogram)
            .opacity(0.5)
            .fill_to(FillTo::Level(0.0)),
    );
    band_params(def).kernel(KernelId::BbWidth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::params::Params;
    use crate::series::Bar;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64, c, c, c, c, 1.0))
            .collect()
    }

    #[test]
    fn test_bollinger_population_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let out = bollinger(&values, 8, 2.0);
        assert_eq!(out.middle[7], Some(5.0));
        assert!((out.upper[7].unwrap() - 9.0).abs() < 1e-12);
        assert!((out.lower[7].unwrap() - 1.0).abs() < 1e-12);
        assert!(out.upper[6].is_none());
    }

    #[test]
    fn test_percent_b_flat_is_half() {
        let out = percent_b(&[3.0; 6], 5, 2.0);
        assert_eq!(out[3], None);
        assert_eq!(out[4], Some(0.5));
        assert_eq!(out[5], Some(0.5));
    }

    #[test]
    fn test_bandwidth_zero_mean() {
        let out = bandwidth(&[0.0; 5], 5, 2.0);
        assert_eq!(out[4], Some(0.0));
    }

    #[test]
    fn test_bandwidth_non_positive_mean_is_zero() {
        let spread: Vec<f64> = (0..40).map(|i| -20.0 + f64::from(i % 7)).collect();
        let out = bandwidth(&spread, 20, 2.0);
        assert!(out[..19].iter().all(Option::is_none));
        assert!(out[19..].iter().all(|v| *v == Some(0.0)));

        let out = bb_width_definition().calculate(&bars(&spread), &Params::new()).unwrap();
        assert!(out.get("width").unwrap().iter().flatten().all(|w| *w == 0.0));
    }

    #[test]
    fn test_percent_b_long_flat_series() {
        let out = percent_b(&[100.1; 300], 20, 2.0);
        assert!(out[..19].iter().all(Option::is_none));
        assert!(out[19..].iter().all(|v| *v == Some(0.5)));

        let out = percent_b_definition().calculate(&bars(&[100.1; 300]), &Params::new()).unwrap();
        assert!(out.get("percentB").unwrap()[19..].iter().all(|v| *v == Some(0.5)));
    }

    #[test]
    fn test_bb_fill_tracks_upper() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + f64::from(i % 5)).collect();
        let out = bb_definition().calculate(&bars(&closes), &Params::new()).unwrap();
        assert_eq!(out.get("fill"), out.get("upper"));
        assert_eq!(out.len(), 4);
        assert!(out.value_at("upper", 18).is_none());
        assert!(out.value_at("upper", 19).is_some());
    }

    #[test]
    fn test_std_dev_bounds() {
        let err = bb_definition()
            .calculate(&bars(&[1.0; 30]), &Params::new().with(STD_DEV, 10.0))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParams);
    }
}
