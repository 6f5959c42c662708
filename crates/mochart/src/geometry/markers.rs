//! External trade markers and marker glyphs.
//!
//! Trade markers come from outside the engine (a backtest, an order feed)
//! and are pinned to the bar nearest in time on the main pane. Glyphs are
//! emitted as line-list segments so they share the indicator vertex stream.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::series::Bar;

/// Kind of trade event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMarkerKind {
    /// Long entry.
    EntryLong,
    /// Short entry.
    EntryShort,
    /// Long exit.
    ExitLong,
    /// Short exit.
    ExitShort,
    /// Stop loss hit.
    StopLoss,
    /// Take profit hit.
    TakeProfit,
    /// Generic signal.
    Signal,
    /// Alert.
    Alert,
}

/// Glyph drawn for a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    /// Upward triangle.
    TriangleUp,
    /// Downward triangle.
    TriangleDown,
    /// 12-segment circle.
    Circle,
    /// Plus sign.
    Cross,
    /// Diamond.
    Diamond,
    /// Triangle with an exclamation mark.
    Warning,
}

/// Default presentation of a marker kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    /// Glyph.
    pub shape: MarkerShape,
    /// Color string.
    pub color: &'static str,
    /// Size before scaling.
    pub size: u32,
}

impl TradeMarkerKind {
    /// Default style for this kind.
    #[must_use]
    pub const fn default_style(self) -> MarkerStyle {
        let (shape, color, size) = match self {
            Self::EntryLong => (MarkerShape::TriangleUp, "#4CAF50", 10),
            Self::EntryShort => (MarkerShape::TriangleDown, "#F44336", 10),
            Self::ExitLong => (MarkerShape::TriangleUp, "#81C784", 8),
            Self::ExitShort => (MarkerShape::TriangleDown, "#E57373", 8),
            Self::StopLoss => (MarkerShape::Cross, "#F44336", 10),
            Self::TakeProfit => (MarkerShape::Circle, "#4CAF50", 8),
            Self::Signal => (MarkerShape::Diamond, "#FFC107", 8),
            Self::Alert => (MarkerShape::Warning, "#FF9800", 10),
        };
        MarkerStyle { shape, color, size }
    }
}

/// A trade event to draw on the price pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMarker {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: TradeMarkerKind,
    /// Event time in epoch milliseconds.
    pub time: i64,
    /// Event price.
    pub price: f64,
    /// Optional text label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Size override; the kind's default size otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

impl TradeMarker {
    /// Creates a marker with the default size and no label.
    #[must_use]
    pub const fn new(kind: TradeMarkerKind, time: i64, price: f64) -> Self {
        Self {
            kind,
            time,
            price,
            label: None,
            size: None,
        }
    }

    /// Size before scaling.
    #[must_use]
    pub fn effective_size(&self) -> f64 {
        self.size
            .unwrap_or_else(|| f64::from(self.kind.default_style().size))
    }
}

/// One line-list segment.
pub type Segment = [[f32; 2]; 2];

impl MarkerShape {
    /// Segments of this glyph centered at `(x, y)` with half-extent `size`.
    #[must_use]
    pub fn segments(self, x: f32, y: f32, size: f32) -> Vec<Segment> {
        let s = size;
        match self {
            Self::TriangleUp => closed(&[[x, y + s], [x - s, y - s], [x + s, y - s]]),
            Self::TriangleDown => closed(&[[x, y - s], [x - s, y + s], [x + s, y + s]]),
            Self::Diamond => closed(&[[x, y + s], [x + s, y], [x, y - s], [x - s, y]]),
            Self::Cross => vec![[[x - s, y], [x + s, y]], [[x, y - s], [x, y + s]]],
            Self::Circle => {
                const SEGMENTS: u8 = 12;
                let point = |i: u8| {
                    let a = f32::from(i) / f32::from(SEGMENTS) * TAU;
                    [a.cos().mul_add(s, x), a.sin().mul_add(s, y)]
                };
                (0..SEGMENTS).map(|i| [point(i), point(i + 1)]).collect()
            }
            Self::Warning => {
                let mut out = Self::TriangleUp.segments(x, y, s);
                out.push([[x, s.mul_add(-0.2, y)], [x, s.mul_add(0.4, y)]]);
                out.push([[x, s.mul_add(-0.6, y)], [x, s.mul_add(-0.55, y)]]);
                out
            }
        }
    }
}

fn closed(points: &[[f32; 2]]) -> Vec<Segment> {
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| [*a, *b])
        .collect()
}

/// Index of the bar closest in time to `time`; ties go to the earlier bar.
///
/// `bars` must be sorted by time.
#[must_use]
pub fn nearest_bar(bars: &[Bar], time: i64) -> Option<usize> {
    if bars.is_empty() {
        return None;
    }
    let idx = bars.partition_point(|b| b.time < time);
    if idx == 0 {
        return Some(0);
    }
    if idx == bars.len() {
        return Some(idx - 1);
    }
    let before = time.abs_diff(bars[idx - 1].time);
    let after = bars[idx].time.abs_diff(time);
    Some(if before <= after { idx - 1 } else { idx })
}
