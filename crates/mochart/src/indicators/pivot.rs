//! Classic floor pivot points from the previous bar.

use crate::plan::definition::{Category, Cost, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
use crate::series::{empty_series, Bar, MultiSeriesOutput, Series};

/// Output of [`pivot_points`].
#[derive(Debug, Clone, PartialEq)]
pub struct PivotOutput {
    /// `(h + l + c) / 3` of the previous bar.
    pub pivot: Series,
    /// `2p - l`
    pub r1: Series,
    /// `2p - h`
    pub s1: Series,
    /// `p + (h - l)`
    pub r2: Series,
    /// `p - (h - l)`
    pub s2: Series,
}

/// Computes pivot levels for every bar from the bar before it.
///
/// # Arguments
///
/// * `bars` - The input bars
///
/// # Returns
///
/// A [`PivotOutput`] whose levels are empty at bar 0.
///
/// # Example
///
/// ```
/// use mochart::indicators::pivot::pivot_points;
/// use mochart::series::Bar;
///
/// let bars = [
///     Bar::new(0, 100.0, 110.0, 90.0, 100.0, 1.0),
///     Bar::new(1, 100.0, 105.0, 95.0, 101.0, 1.0),
/// ];
/// let out = pivot_points(&bars);
/// assert_eq!(out.pivot[0], None);
/// assert_eq!(out.pivot[1], Some(100.0));
/// assert_eq!(out.r1[1], Some(110.0));
/// assert_eq!(out.s2[1], Some(80.0));
/// ```
#[must_use]
pub fn pivot_points(bars: &[Bar]) -> PivotOutput {
    let n = bars.len();
    let mut out = PivotOutput {
        pivot: empty_series(n),
        r1: empty_series(n),
        s1: empty_series(n),
        r2: empty_series(n),
        s2: empty_series(n),
    };
    // Bar `i` reads bar `i - 1`.
    for (i, prev) in (1..n).zip(bars) {
        let p = prev.typical_price();
        let range = prev.high - prev.low;
        out.pivot[i] = Some(p);
        out.r1[i] = Some(2.0 * p - prev.low);
        out.s1[i] = Some(2.0 * p - prev.high);
        out.r2[i] = Some(p + range);
        out.s2[i] = Some(p - range);
    }
    out
}

pub(crate) fn pivot_definition() -> IndicatorDefinition {
    IndicatorDefinition::new("pivot_points", "Pivot Points", Category::Trend, Pane::Main, |bars, _| {
        let out = pivot_points(bars);
        Ok(MultiSeriesOutput::new()
            .with("pivot", out.pivot)
            .with("r1", out.r1)
            .with("s1", out.s1)
            .with("r2", out.r2)
            .with("s2", out.s2))
    })
    .output(OutputStyle::new("pivot", "#607D8B", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("r1", "#8BC34A", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("s1", "#F44336", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("r2", "#4CAF50", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .output(OutputStyle::new("s2", "#E57373", PlotStyle::Line, ZLayer::Line).line_width(1.0))
    .warmup(|_| 1)
    .complexity(Cost::Linear, Cost::Linear)
}
