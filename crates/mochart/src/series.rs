//! Bar and series types shared by every layer of the engine.
//!
//! A [`Bar`] is one OHLCV sample. Indicators turn a slice of bars into a
//! [`MultiSeriesOutput`]: one nullable [`Series`] per declared output, each
//! exactly as long as the bar slice. `None` marks a sample that is not yet
//! defined (warmup) or deliberately absent (sparse marker outputs).
//!
//! # Example
//!
//! ```
//! use mochart::series::{Bar, MultiSeriesOutput};
//!
//! let bars = vec![Bar::new(0, 1.0, 2.0, 0.5, 1.5, 100.0)];
//! let mut out = MultiSeriesOutput::new();
//! out.insert("close", bars.iter().map(|b| Some(b.close)).collect());
//! assert_eq!(out.get("close").map(Vec::len), Some(1));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single OHLCV sample. `time` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time in epoch milliseconds.
    pub time: i64,
    /// Opening price.
    pub open: f64,
    /// Highest traded price.
    pub high: f64,
    /// Lowest traded price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

impl Bar {
    /// Creates a new bar.
    #[must_use]
    pub const fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Typical price `(high + low + close) / 3`.
    #[must_use]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// True range against the previous close.
    #[must_use]
    pub fn true_range(&self, prev_close: f64) -> f64 {
        (self.high - self.low)
            .max((self.high - prev_close).abs())
            .max((self.low - prev_close).abs())
    }
}

/// A nullable numeric series aligned with the bar slice.
pub type Series = Vec<Option<f64>>;

/// Returns a series of `len` empty samples.
#[must_use]
pub fn empty_series(len: usize) -> Series {
    vec![None; len]
}

/// Named outputs of one indicator computation.
///
/// Output names are kept in a sorted map so iteration is deterministic;
/// declared output order lives on the indicator definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiSeriesOutput {
    series: BTreeMap<String, Series>,
}

impl MultiSeriesOutput {
    /// Creates an empty output set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) the series for `name`.
    pub fn insert(&mut self, name: impl Into<String>, series: Series) -> Option<Series> {
        self.series.insert(name.into(), series)
    }

    /// Adds `name` and returns `self`, for building outputs inline.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, series: Series) -> Self {
        self.insert(name, series);
        self
    }

    /// Returns the series for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    /// Returns the sample of `name` at `index`, flattening missing outputs
    /// and out-of-range indices to `None`.
    #[must_use]
    pub fn value_at(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name)?.get(index).copied().flatten()
    }

    /// Returns the number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Returns `true` if there are no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Iterates over `(name, series)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.series.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over every finite sample of every output.
    pub fn finite_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.series
            .values()
            .flat_map(|s| s.iter().filter_map(|v| *v))
            .filter(|v| v.is_finite())
    }
}

impl FromIterator<(String, Series)> for MultiSeriesOutput {
    fn from_iter<I: IntoIterator<Item = (String, Series)>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

/// Counts the leading `None` samples of a series.
#[must_use]
pub fn count_leading_none(series: &[Option<f64>]) -> usize {
    series.iter().take_while(|v| v.is_none()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typical_price_and_true_range() {
        let bar = Bar::new(0, 10.0, 12.0, 9.0, 11.0, 5.0);
        assert!((bar.typical_price() - 32.0 / 3.0).abs() < 1e-12);
        assert!((bar.true_range(10.0) - 3.0).abs() < 1e-12);
        assert!((bar.true_range(15.0) - 6.0).abs() < 1e-12);
        assert!((bar.true_range(5.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_value_at() {
        let out = MultiSeriesOutput::new().with("a", vec![None, Some(2.0)]);
        assert_eq!(out.value_at("a", 0), None);
        assert_eq!(out.value_at("a", 1), Some(2.0));
        assert_eq!(out.value_at("a", 7), None);
        assert_eq!(out.value_at("b", 1), None);
    }

    #[test]
    fn test_finite_values_skip_nan_and_none() {
        let out = MultiSeriesOutput::new()
            .with("a", vec![None, Some(1.0), Some(f64::NAN)])
            .with("b", vec![Some(f64::INFINITY), Some(3.0)]);
        let values: Vec<f64> = out.finite_values().collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_count_leading_none() {
        assert_eq!(count_leading_none(&[None, None, Some(1.0), None]), 2);
        assert_eq!(count_leading_none(&[]), 0);
    }

    #[test]
    fn test_bar_serde() {
        let json = r#"{"time":1,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":10.0}"#;
        let bar: Bar = serde_json::from_str(json).unwrap();
        assert_eq!(bar, Bar::new(1, 1.0, 2.0, 0.5, 1.5, 10.0));
    }
}
