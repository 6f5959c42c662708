//! Sparse marker indicators and the alerts they carry.
//!
//! Marker outputs hold the close price on bars where a condition holds and
//! `None` everywhere else. `trade_markers` and `kaufman_patterns` are
//! placeholders that reserve a marker slot on the main pane; external trade
//! markers are drawn by the geometry composer instead.

use super::bollinger::{bollinger, width_ratio};
use super::rsi::rsi;
use super::{closes, single, PERIOD, STD_DEV};
use crate::plan::definition::{
    AlertSpec, Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, Severity, ValueMap,
    ZLayer,
};
use crate::plan::params::ParamSpec;
use crate::series::{empty_series, Bar, Series};

/// Leading empty samples of [`divergence`].
#[must_use]
pub const fn divergence_lookback(period: usize) -> usize {
    period + 2
}

/// Close on bars whose Bollinger bandwidth is below `threshold`.
///
/// # Arguments
///
/// * `bars` - The input bars; bands are taken over close
/// * `period` - Band window length
/// * `k` - Band width in standard deviations
/// * `threshold` - Bandwidth below which a bar counts as a squeeze
///
/// # Returns
///
/// A sparse series holding the close of every squeeze bar. A window whose
/// mean is zero or negative has bandwidth 0 and counts as a squeeze.
///
/// # Example
///
/// ```
/// use mochart::indicators::signals::squeeze;
/// use mochart::series::Bar;
///
/// let bars: Vec<Bar> = (0..6).map(|i| Bar::new(i, 10.0, 10.0, 10.0, 10.0, 1.0)).collect();
/// let out = squeeze(&bars, 5, 2.0, 0.04);
/// assert_eq!(out[3], None);
/// assert_eq!(out[4], Some(10.0));
/// ```
#[must_use]
pub fn squeeze(bars: &[Bar], period: usize, k: f64, threshold: f64) -> Series {
    let bands = bollinger(&closes(bars), period, k);
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let width = width_ratio(bands.upper[i]?, bands.lower[i]?, bands.middle[i]?);
            (width < threshold).then_some(bar.close)
        })
        .collect()
}

/// Close on bars where price rose over the last two bars while RSI fell.
///
/// # Arguments
///
/// * `bars` - The input bars
/// * `period` - RSI period
///
/// # Returns
///
/// A sparse series, empty for the first [`divergence_lookback`]`(period)`
/// bars.
#[must_use]
pub fn divergence(bars: &[Bar], period: usize) -> Series {
    let closes = closes(bars);
    let rsi = rsi(&closes, period);
    let mut out = empty_series(bars.len());
    for i in divergence_lookback(period)..bars.len() {
        let prev = i - 2;
        let (Some(now), Some(then)) = (rsi[i], rsi[prev]) else {
            continue;
        };
        if closes[i] > closes[prev] && now < then {
            out[i] = Some(closes[i]);
        }
    }
    out
}

fn has_value(values: &ValueMap, name: &str) -> bool {
    values.get(name).copied().flatten().is_some()
}

pub(crate) fn trade_markers_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("trade_markers", "Trade Markers", Category::Custom, Pane::Main, |bars, _| {
        Ok(single("markers", empty_series(bars.len())))
    })
    .output(OutputStyle::new("markers", "#FFC107", PlotStyle::Marker, ZLayer::Marker))
    .complexity(Cost::Linear, Cost::Linear)
}

pub(crate) fn kaufman_patterns_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("kaufman_patterns", "Kaufman Patterns", Category::Custom, Pane::Main, |bars, _| {
        Ok(single("kaufman", empty_series(bars.len())))
    })
    .output(OutputStyle::new("kaufman", "#FFC107", PlotStyle::Marker, ZLayer::Marker))
    .warmup(|_| 2)
    .complexity(Cost::Linear, Cost::Linear)
}

/// `squeeze_alert` marker with the `squeeze_found` alert (60 s cooldown).
///
/// Parameters: `period` (20, 5..=100), `stdDev` (2.0, 0.5..=4.0) and
/// `threshold` (0.04, 0.01..=0.2).
pub(crate) fn squeeze_alert_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("squeeze_alert", "Squeeze Alert", Category::Volatility, Pane::Main, |bars, params| {
        let period = params.period(PERIOD)?;
        let k = params.number(STD_DEV)?;
        let threshold = params.number("threshold")?;
        Ok(single("squeeze", squeeze(bars, period, k, threshold)))
    })
    .output(OutputStyle::new("squeeze", "#FF9800", PlotStyle::Marker, ZLayer::Marker))
    .param(PERIOD, ParamSpec::number("Period", 20.0).range(5.0, 100.0).step(1.0))
    .param(STD_DEV, ParamSpec::number("Std Dev", 2.0).range(0.5, 4.0).step(0.1))
    .param(
        "threshold",
        ParamSpec::number("Threshold", 0.04).range(0.01, 0.2).step(0.01),
    )
    .warmup(|p| p.period_or(PERIOD, 20).saturating_sub(1))
    .complexity(Cost::Windowed, Cost::Linear)
    .alert(AlertSpec::new(
        "squeeze_found",
        "Squeeze Detected",
        Severity::Warning,
        60,
        |current, _, _| has_value(current, "squeeze"),
        |_, bar| format!("Squeeze detected at price {}", bar.close),
    ))
}

/// `divergence` marker with the `divergence_found` alert.
pub(crate) fn divergence_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("divergence", "Divergence", Category::Custom, Pane::Main, |bars, params| {
        let period = params.period(PERIOD)?;
        Ok(single("divergence", divergence(bars, period)))
    })
    .output(OutputStyle::new("divergence", "#FFC107", PlotStyle::Marker, ZLayer::Marker))
    .param(PERIOD, ParamSpec::number("Period", 14.0).range(2.0, 50.0).step(1.0))
    .warmup(|p| divergence_lookback(p.period_or(PERIOD, 14)))
    .complexity(Cost::Linear, Cost::Linear)
    .alert(AlertSpec::new(
        "divergence_found",
        "Divergence Detected",
        Severity::Warning,
        60,
        |current, _, _| has_value(current, "divergence"),
        |_, bar| format!("Divergence detected at price {}", bar.close),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::params::Params;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64, c, c + 0.5, c - 0.5, c, 1.0))
            .collect()
    }

    #[test]
    fn test_squeeze_on_flat_prices() {
        let flat = bars(&[100.0; 10]);
        let out = squeeze(&flat, 5, 2.0, 0.04);
        assert!(out[..4].iter().all(Option::is_none));
        assert!(out[4..].iter().all(|v| *v == Some(100.0)));
    }

    #[test]
    fn test_no_squeeze_when_volatile() {
        let closes: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 50.0 } else { 150.0 }).collect();
        assert!(squeeze(&bars(&closes), 5, 2.0, 0.04).iter().all(Option::is_none));
    }

    #[test]
    fn test_squeeze_non_positive_mean() {
        let closes: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { -50.0 } else { -40.0 }).collect();
        let out = squeeze(&bars(&closes), 5, 2.0, 0.04);
        assert!(out[4..].iter().all(Option::is_some));
    }

    #[test]
    fn test_divergence_detects_weakening_rally() {
        // Strong rally, then a slow grind higher: price makes higher closes
        // while RSI decays.
        let mut closes: Vec<f64> = (0..8).map(|i| 100.0 + 5.0 * f64::from(i)).collect();
        closes.extend([134.0, 135.5, 134.8, 135.9, 135.2, 136.1]);
        let out = divergence(&bars(&closes), 3);
        assert!(out[..5].iter().all(Option::is_none));
        assert!(out.iter().flatten().count() > 0);
        for (i, v) in out.iter().enumerate() {
            if let Some(v) = v {
                assert_eq!(*v, closes[i]);
                assert!(closes[i] > closes[i - 2]);
            }
        }
    }

    #[test]
    fn test_placeholders_are_empty() {
        let data = bars(&[1.0, 2.0, 3.0]);
        let out = trade_markers_definition().calculate(&data, &Params::new()).unwrap();
        assert_eq!(out.get("markers").unwrap(), &vec![None, None, None]);
        let out = kaufman_patterns_definition()
            .calculate(&data, &Params::new())
            .unwrap();
        assert_eq!(out.get("kaufman").unwrap().len(), 3);
    }

    #[test]
    fn test_squeeze_alert_spec() {
        let def = squeeze_alert_definition();
        let alert = &def.alerts()[0];
        assert_eq!(alert.id, "squeeze_found");
        assert_eq!(alert.cooldown_secs, 60);

        let mut current = ValueMap::new();
        current.insert("squeeze".into(), None);
        let bar = Bar::new(0, 1.0, 1.0, 1.0, 101.5, 1.0);
        assert!(!alert.is_triggered(&current, &ValueMap::new(), &bar));
        current.insert("squeeze".into(), Some(101.5));
        assert!(alert.is_triggered(&current, &ValueMap::new(), &bar));
        assert_eq!(
            alert.format_message(&current, &bar),
            "Squeeze detected at price 101.5"
        );
    }
}
