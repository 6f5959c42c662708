//! Fixed-layout kernel parameter blocks.
//!
//! Every kernel receives exactly 16 little-endian bytes. Three layouts
//! exist, chosen by indicator id:
//!
//! | Layout   | Ids                           | @0       | @4           | @8          | @12         |
//! |----------|-------------------------------|----------|--------------|-------------|-------------|
//! | `Band`   | `bb`, `percent_b`, `bb_width` | `period` | `stdDev` f32 | `bar_count` | -           |
//! | `Triple` | `macd`                        | `fast`   | `slow`       | `signal`    | `bar_count` |
//! | `Single` | anything else                 | `period` | `bar_count`  | -           | -           |
//!
//! Missing parameters take the layout defaults: 20 / 2.0 for bands,
//! 12 / 26 / 9 for MACD, 14 for the single-period layout.
//!
//! # Example
//!
//! ```
//! use mochart::kernels::params::ParamLayout;
//! use mochart::plan::params::Params;
//!
//! let block = ParamLayout::for_indicator("rsi")
//!     .pack(&Params::new().with("period", 10), 500)
//!     .unwrap();
//! assert_eq!(&block.as_bytes()[0..8], &[10, 0, 0, 0, 244, 1, 0, 0]);
//! ```

use bytemuck::{Pod, Zeroable};
use num_traits::NumCast;

use crate::error::{Error, Result};
use crate::indicators::macd::{FAST_PERIOD, SIGNAL_PERIOD, SLOW_PERIOD};
use crate::plan::params::Params;

/// Size of every parameter block in bytes.
pub const PARAM_BLOCK_SIZE: usize = 16;

/// Band layout: `period`, `stdDev`, `bar_count`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BandParams {
    /// Window length.
    pub period: u32,
    /// Band width in standard deviations.
    pub std_dev: f32,
    /// Number of bars in the buffer.
    pub bar_count: u32,
    /// Padding.
    pub _pad: u32,
}

/// MACD layout: three windows and `bar_count`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TripleParams {
    /// Fast EMA length.
    pub fast: u32,
    /// Slow EMA length.
    pub slow: u32,
    /// Signal EMA length.
    pub signal: u32,
    /// Number of bars in the buffer.
    pub bar_count: u32,
}

/// Single-period layout: `period`, `bar_count`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PeriodParams {
    /// Window length.
    pub period: u32,
    /// Number of bars in the buffer.
    pub bar_count: u32,
    /// Padding.
    pub _pad: [u32; 2],
}

const _: () = assert!(std::mem::size_of::<BandParams>() == PARAM_BLOCK_SIZE);
const _: () = assert!(std::mem::size_of::<TripleParams>() == PARAM_BLOCK_SIZE);
const _: () = assert!(std::mem::size_of::<PeriodParams>() == PARAM_BLOCK_SIZE);

/// The raw 16 bytes handed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParamBlock([u8; PARAM_BLOCK_SIZE]);

impl ParamBlock {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PARAM_BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw little-endian bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PARAM_BLOCK_SIZE] {
        &self.0
    }

    /// Reads the `u32` at byte `offset`.
    #[must_use]
    pub fn u32_at(&self, offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.0[offset..offset + 4]);
        u32::from_le_bytes(word)
    }

    /// Reads the `f32` at byte `offset`.
    #[must_use]
    pub fn f32_at(&self, offset: usize) -> f32 {
        f32::from_bits(self.u32_at(offset))
    }

    /// Decodes the band layout.
    #[must_use]
    pub fn band(&self) -> BandParams {
        BandParams {
            period: self.u32_at(0),
            std_dev: self.f32_at(4),
            bar_count: self.u32_at(8),
            _pad: 0,
        }
    }

    /// Decodes the MACD layout.
    #[must_use]
    pub fn triple(&self) -> TripleParams {
        TripleParams {
            fast: self.u32_at(0),
            slow: self.u32_at(4),
            signal: self.u32_at(8),
            bar_count: self.u32_at(12),
        }
    }

    /// Decodes the single-period layout.
    #[must_use]
    pub fn period(&self) -> PeriodParams {
        PeriodParams {
            period: self.u32_at(0),
            bar_count: self.u32_at(4),
            _pad: [0; 2],
        }
    }

    fn from_pod<T: Pod>(value: &T) -> Self {
        let mut bytes = [0u8; PARAM_BLOCK_SIZE];
        bytes.copy_from_slice(bytemuck::bytes_of(value));
        Self(bytes)
    }
}

impl From<BandParams> for ParamBlock {
    fn from(p: BandParams) -> Self {
        Self::from_pod(&BandParams {
            period: p.period.to_le(),
            std_dev: f32::from_bits(p.std_dev.to_bits().to_le()),
            bar_count: p.bar_count.to_le(),
            _pad: 0,
        })
    }
}

impl From<TripleParams> for ParamBlock {
    fn from(p: TripleParams) -> Self {
        Self::from_pod(&TripleParams {
            fast: p.fast.to_le(),
            slow: p.slow.to_le(),
            signal: p.signal.to_le(),
            bar_count: p.bar_count.to_le(),
        })
    }
}

impl From<PeriodParams> for ParamBlock {
    fn from(p: PeriodParams) -> Self {
        Self::from_pod(&PeriodParams {
            period: p.period.to_le(),
            bar_count: p.bar_count.to_le(),
            _pad: [0; 2],
        })
    }
}

/// Which of the three layouts a kernel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLayout {
    /// `period`, `stdDev`, `bar_count`.
    Band,
    /// `fast`, `slow`, `signal`, `bar_count`.
    Triple,
    /// `period`, `bar_count`.
    Single,
}

impl ParamLayout {
    /// Picks the layout for an indicator id.
    #[must_use]
    pub fn for_indicator(id: &str) -> Self {
        match id {
            "bb" | "percent_b" | "bb_width" => Self::Band,
            "macd" => Self::Triple,
            _ => Self::Single,
        }
    }

    /// Packs resolved parameters for `bar_count` bars.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] if a window does not fit in `u32`,
    /// or [`Error::AcceleratedPath`] if `bar_count` does not.
    pub fn pack(self, params: &Params, bar_count: usize) -> Result<ParamBlock> {
        let bar_count: u32 = NumCast::from(bar_count)
            .ok_or_else(|| Error::accelerated(format!("{bar_count} bars exceed the kernel limit")))?;
        let block = match self {
            Self::Band => BandParams {
                period: window(params, "period", 20)?,
                std_dev: NumCast::from(params.number_or("stdDev", 2.0))
                    .ok_or_else(|| Error::invalid_param("stdDev", "does not fit f32"))?,
                bar_count,
                _pad: 0,
            }
            .into(),
            Self::Triple => TripleParams {
                fast: window(params, FAST_PERIOD, 12)?,
                slow: window(params, SLOW_PERIOD, 26)?,
                signal: window(params, SIGNAL_PERIOD, 9)?,
                bar_count,
            }
            .into(),
            Self::Single => PeriodParams {
                period: window(params, "period", 14)?,
                bar_count,
                _pad: [0; 2],
            }
            .into(),
        };
        Ok(block)
    }
}

fn window(params: &Params, name: &str, default: usize) -> Result<u32> {
    let period = params.period_or(name, default);
    NumCast::from(period).ok_or_else(|| Error::invalid_param(name, "does not fit u32"))
}
