//! Built-in indicator catalog.
//!
//! Each submodule exposes plain compute functions over `f64` slices or bars
//! (usable on their own), a `*_lookback` function giving the number of
//! leading empty samples, and a crate-private definition constructor that
//! wires the function into an [`IndicatorDefinition`].
//!
//! # Example
//!
//! ```
//! use mochart::indicators::moving_average::{sma, sma_lookback};
//!
//! let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let out = sma(&closes, 3);
//! assert_eq!(out.iter().take_while(|v| v.is_none()).count(), sma_lookback(3));
//! assert_eq!(out[4], Some(4.0));
//! ```

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod pivot;
pub mod rsi;
pub mod signals;
pub mod volume;
pub mod window;

use crate::plan::definition::IndicatorDefinition;
use crate::plan::registry::Registry;
use crate::series::{Bar, MultiSeriesOutput, Series};

/// Number of definitions installed by [`register_builtins`].
pub const BUILTIN_COUNT: usize = 20;

pub(crate) const PERIOD: &str = "period";
pub(crate) const STD_DEV: &str = "stdDev";

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

pub(crate) fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume).collect()
}

pub(crate) fn single(name: &str, series: Series) -> MultiSeriesOutput {
    MultiSeriesOutput::new().with(name, series)
}

/// Returns fresh copies of every built-in definition.
#[must_use]
pub fn builtin_definitions() -> Vec<IndicatorDefinition> {
    vec![
        moving_average::sma_definition(),
        moving_average::ema_definition(),
        bollinger::bb_definition(),
        rsi::rsi_definition(),
        macd::macd_definition(),
        atr::atr_definition(),
        adx::adx_definition(),
        volume::volume_definition(),
        volume::obv_definition(),
        volume::cmf_definition(),
        volume::mfi_definition(),
        volume::vwap_definition(),
        volume::vol_ratio_definition(),
        bollinger::percent_b_definition(),
        bollinger::bb_width_definition(),
        pivot::pivot_definition(),
        signals::trade_markers_definition(),
        signals::kaufman_patterns_definition(),
        signals::squeeze_alert_definition(),
        signals::divergence_definition(),
    ]
}

/// Installs every built-in definition, replacing same-id entries.
pub fn register_builtins(registry: &mut Registry) {
    for definition in builtin_definitions() {
        registry.register(definition);
    }
}
