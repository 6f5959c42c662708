//! Pane placement and coordinate mapping.
//!
//! Device coordinates run from -1 (left, bottom) to 1 (right, top). Each
//! pane occupies a horizontal band given by its top offset and height as
//! fractions of the plot height.

use serde::{Deserialize, Serialize};

use crate::plan::definition::Pane;
use crate::plan::scheduler::ValueRange;

/// Vertical placement of one pane, as fractions of the plot height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaneRect {
    /// Distance from the top of the plot.
    pub top: f64,
    /// Height of the pane.
    pub height: f64,
}

impl PaneRect {
    /// Creates a rect.
    #[must_use]
    pub const fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    /// Device y of the pane's top edge.
    #[must_use]
    pub fn top_ndc(&self) -> f64 {
        2.0f64.mul_add(-self.top, 1.0)
    }

    /// Device y of the pane's bottom edge.
    #[must_use]
    pub fn bottom_ndc(&self) -> f64 {
        2.0f64.mul_add(-(self.top + self.height), 1.0)
    }
}

/// Placement of all four panes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneLayout {
    /// Price pane.
    pub main: PaneRect,
    /// First sub-pane.
    pub sub1: PaneRect,
    /// Second sub-pane.
    pub sub2: PaneRect,
    /// Third sub-pane.
    pub sub3: PaneRect,
}

impl Default for PaneLayout {
    fn default() -> Self {
        Self {
            main: PaneRect::new(0.0, 0.6),
            sub1: PaneRect::new(0.6, 0.15),
            sub2: PaneRect::new(0.75, 0.15),
            sub3: PaneRect::new(0.9, 0.1),
        }
    }
}

impl PaneLayout {
    /// Placement of `pane`.
    #[must_use]
    pub const fn rect(&self, pane: Pane) -> PaneRect {
        match pane {
            Pane::Main => self.main,
            Pane::Sub1 => self.sub1,
            Pane::Sub2 => self.sub2,
            Pane::Sub3 => self.sub3,
        }
    }

    /// Maps `value` in `range` to a device y inside `pane`.
    ///
    /// Values outside the range map outside the pane; no clamping is done.
    #[must_use]
    pub fn to_pane_y(&self, pane: Pane, range: ValueRange, value: f64) -> f64 {
        let rect = self.rect(pane);
        let (top, bottom) = (rect.top_ndc(), rect.bottom_ndc());
        let ratio = (value - range.min) / range.span();
        (top - bottom).mul_add(ratio, bottom)
    }
}

/// Device x of bar `index` out of `count` bars.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_x(index: usize, count: usize) -> f64 {
    let step = 2.0 / count.saturating_sub(1).max(1) as f64;
    step.mul_add(index as f64, -1.0)
}
