//! Accelerated-path kernels and buffer plumbing.
//!
//! The accelerated path does not run indicator formulas directly. It
//! flattens the bars into a shared `f32` [`BarBuffer`], packs each
//! instance's parameters into a 16-byte [`ParamBlock`](params::ParamBlock),
//! submits both to an [`AcceleratedBackend`](backend::AcceleratedBackend)
//! and de-interleaves the returned output buffer back into nullable series.
//!
//! # Buffer formats
//!
//! - Bars: 6 `f32` per bar, `time, open, high, low, close, volume`.
//! - Outputs: `output_count` `f32` per bar, in declared output order.
//!   [`NAN_SENTINEL`] marks an undefined sample.
//!
//! # Kernels
//!
//! The set of kernels is closed; [`KernelId`] names each one and knows its
//! parameter layout and output count. Results agree with the default path
//! within single-precision tolerance.
//!
//! # Example
//!
//! ```
//! use mochart::kernels::{deinterleave, BarBuffer};
//! use mochart::series::Bar;
//!
//! let bars = [Bar::new(0, 1.0, 2.0, 0.5, 1.5, 10.0)];
//! let buffer = BarBuffer::from_bars(&bars);
//! assert_eq!(buffer.as_slice()[4], 1.5);
//!
//! let out = deinterleave(&[f32::NAN, 3.0], 1, &["a", "b"]).unwrap();
//! assert_eq!(out.value_at("a", 0), None);
//! assert_eq!(out.value_at("b", 0), Some(3.0));
//! ```

pub mod backend;
pub mod params;
mod software;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::series::{Bar, MultiSeriesOutput};
use params::ParamLayout;

pub use backend::{AcceleratedBackend, KernelRequest, SoftwareBackend};
pub use params::ParamBlock;

/// Number of `f32` values per bar in the bar buffer.
pub const BAR_STRIDE: usize = 6;

/// Quiet NaN written to undefined output slots (`0x7FC0_0000`).
pub const NAN_SENTINEL: f32 = f32::from_bits(0x7FC0_0000);

/// The closed set of accelerated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    /// Simple moving average.
    Sma,
    /// Exponential moving average.
    Ema,
    /// Bollinger bands (upper, middle, lower, fill).
    Bollinger,
    /// Relative strength index.
    Rsi,
    /// Average true range.
    Atr,
    /// MACD line, signal, histogram.
    Macd,
    /// ADX, +DI, -DI.
    Adx,
    /// Rolling volume-weighted average price.
    Vwap,
    /// Volume over its moving average.
    VolRatio,
    /// Position of close inside the bands.
    PercentB,
    /// Band width relative to the middle band.
    BbWidth,
}

impl KernelId {
    /// Every kernel.
    pub const ALL: [Self; 11] = [
        Self::Sma,
        Self::Ema,
        Self::Bollinger,
        Self::Rsi,
        Self::Atr,
        Self::Macd,
        Self::Adx,
        Self::Vwap,
        Self::VolRatio,
        Self::PercentB,
        Self::BbWidth,
    ];

    /// Indicator id this kernel implements.
    #[must_use]
    pub const fn indicator_id(self) -> &'static str {
        match self {
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Bollinger => "bb",
            Self::Rsi => "rsi",
            Self::Atr => "atr",
            Self::Macd => "macd",
            Self::Adx => "adx",
            Self::Vwap => "vwap",
            Self::VolRatio => "vol_ratio",
            Self::PercentB => "percent_b",
            Self::BbWidth => "bb_width",
        }
    }

    /// Values written per bar.
    #[must_use]
    pub const fn output_count(self) -> usize {
        match self {
            Self::Bollinger => 4,
            Self::Macd | Self::Adx => 3,
            _ => 1,
        }
    }

    /// Parameter layout.
    #[must_use]
    pub fn layout(self) -> ParamLayout {
        ParamLayout::for_indicator(self.indicator_id())
    }
}

/// Bars flattened for kernel consumption, shared across a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BarBuffer {
    data: Arc<[f32]>,
    len: usize,
}

impl BarBuffer {
    /// Flattens `bars`. Values are narrowed to `f32`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_bars(bars: &[Bar]) -> Self {
        let data: Vec<f32> = bars
            .iter()
            .flat_map(|b| {
                [
                    b.time as f32,
                    b.open as f32,
                    b.high as f32,
                    b.low as f32,
                    b.close as f32,
                    b.volume as f32,
                ]
            })
            .collect();
        Self {
            data: data.into(),
            len: bars.len(),
        }
    }

    /// Number of bars.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no bars.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The flat `f32` data.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The flat data as bytes, ready for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data[..])
    }
}

/// Splits an interleaved output buffer into named series.
///
/// NaN (and any non-finite value) becomes `None`.
///
/// # Errors
///
/// Returns [`Error::AcceleratedPath`] if the buffer is shorter than
/// `bar_count * names.len()`.
pub fn deinterleave(buffer: &[f32], bar_count: usize, names: &[&str]) -> Result<MultiSeriesOutput> {
    let stride = names.len();
    let expected = bar_count * stride;
    if buffer.len() < expected {
        return Err(Error::accelerated(format!(
            "output buffer has {} values, expected {expected}",
            buffer.len()
        )));
    }
    Ok(names
        .iter()
        .enumerate()
        .map(|(s, name)| {
            let series = (0..bar_count)
                .map(|i| {
                    let v = buffer[i * stride + s];
                    v.is_finite().then(|| f64::from(v))
                })
                .collect();
            ((*name).to_owned(), series)
        })
        .collect())
}
