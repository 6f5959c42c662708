//! Indicator definitions: the contract every indicator satisfies.
//!
//! An [`IndicatorDefinition`] is an immutable descriptor registered once
//! per id. It carries presentation metadata (pane, output styles, guides),
//! a parameter schema, ordering-only dependencies, a warmup function, the
//! formula itself and, optionally, an accelerated kernel and alert specs.
//!
//! Formulas are capability objects so user extensions can close over
//! state; built-in formulas are plain functions.
//!
//! # Example
//!
//! ```
//! use mochart::plan::definition::{Category, IndicatorDefinition, OutputStyle, Pane, PlotStyle, ZLayer};
//! use mochart::plan::params::{ParamSpec, Params};
//! use mochart::series::{Bar, MultiSeriesOutput};
//!
//! let def = IndicatorDefinition::new("close", "Close", Category::Custom, Pane::Sub1, |bars, _params| {
//!     Ok(MultiSeriesOutput::new().with("close", bars.iter().map(|b| Some(b.close)).collect()))
//! })
//! .output(OutputStyle::new("close", "#FFFFFF", PlotStyle::Line, ZLayer::Line));
//!
//! let bars = [Bar::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)];
//! let out = def.calculate(&bars, &Params::new()).unwrap();
//! assert_eq!(out.value_at("close", 0), Some(1.0));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernels::KernelId;
use crate::plan::params::{ParamSchema, ParamSpec, Params};
use crate::series::{Bar, MultiSeriesOutput};

/// Indicator formula: `(bars, resolved params) -> outputs`.
pub type CalculateFn = Arc<dyn Fn(&[Bar], &Params) -> Result<MultiSeriesOutput> + Send + Sync>;

/// Warmup function: number of leading empty samples on the primary output.
pub type WarmupFn = Arc<dyn Fn(&Params) -> usize + Send + Sync>;

/// Named sample values handed to alert conditions and message formatters.
pub type ValueMap = BTreeMap<String, Option<f64>>;

/// Alert predicate over `(current, previous, last bar)`.
pub type AlertCondition = Arc<dyn Fn(&ValueMap, &ValueMap, &Bar) -> bool + Send + Sync>;

/// Alert message formatter over `(current, last bar)`.
pub type AlertMessage = Arc<dyn Fn(&ValueMap, &Bar) -> String + Send + Sync>;

/// Broad indicator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Trend-following.
    Trend,
    /// Oscillators and momentum.
    Momentum,
    /// Dispersion and range.
    Volatility,
    /// Volume and money flow.
    Volume,
    /// Anything else, including markers.
    Custom,
}

/// One of the four fixed vertical regions of the plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pane {
    /// Price pane; shares the bar high/low range.
    Main,
    /// First sub-pane.
    Sub1,
    /// Second sub-pane.
    Sub2,
    /// Third sub-pane.
    Sub3,
}

impl Pane {
    /// All panes, top to bottom.
    pub const ALL: [Self; 4] = [Self::Main, Self::Sub1, Self::Sub2, Self::Sub3];

    /// Returns `true` for the price pane.
    #[must_use]
    pub const fn is_main(self) -> bool {
        matches!(self, Self::Main)
    }
}

/// How an output series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStyle {
    /// Polyline through consecutive samples.
    Line,
    /// Vertical segments from the zero baseline.
    Histogram,
    /// Filled area; drawn as its outline.
    Area,
    /// Filled region between two outputs.
    Band,
    /// Point glyph per sample.
    Marker,
    /// Filled region between two lines with sign coloring.
    Cloud,
    /// Vertical bars from the zero baseline.
    Bar,
    /// Candlestick body.
    Candle,
}

/// Draw order bucket; higher layers are drawn later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ZLayer {
    /// 0
    Background = 0,
    /// 10: band and cloud fills.
    Fill = 10,
    /// 20: histograms and bars.
    Histogram = 20,
    /// 30: lines.
    Line = 30,
    /// 40: markers.
    Marker = 40,
    /// 50: overlays drawn above everything.
    Overlay = 50,
}

impl From<ZLayer> for u8 {
    fn from(z: ZLayer) -> Self {
        z as Self
    }
}

impl TryFrom<u8> for ZLayer {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Background),
            10 => Ok(Self::Fill),
            20 => Ok(Self::Histogram),
            30 => Ok(Self::Line),
            40 => Ok(Self::Marker),
            50 => Ok(Self::Overlay),
            other => Err(format!("invalid z-layer {other}")),
        }
    }
}

/// Target of a filled style: another output or a constant level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillTo {
    /// Fill towards the named output.
    Output(String),
    /// Fill towards a constant value.
    Level(f64),
}

/// Presentation of one output series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputStyle {
    /// Output name, the key into [`MultiSeriesOutput`].
    pub name: String,
    /// CSS-style color string.
    pub color: String,
    /// Draw style.
    pub style: PlotStyle,
    /// Draw order bucket.
    pub z_layer: ZLayer,
    /// Stroke width hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    /// Opacity hint multiplied into the color alpha.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    /// Fill target for area/band styles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_to: Option<FillTo>,
}

impl OutputStyle {
    /// Creates a style with no optional hints.
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>, style: PlotStyle, z_layer: ZLayer) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            style,
            z_layer,
            line_width: None,
            opacity: None,
            fill_to: None,
        }
    }

    /// Sets the stroke width hint.
    #[must_use]
    pub const fn line_width(mut self, width: f32) -> Self {
        self.line_width = Some(width);
        self
    }

    /// Sets the opacity hint.
    #[must_use]
    pub const fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Sets the fill target.
    #[must_use]
    pub fn fill_to(mut self, target: FillTo) -> Self {
        self.fill_to = Some(target);
        self
    }
}

/// Asymptotic cost classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cost {
    /// O(1)
    #[serde(rename = "O(1)")]
    Constant,
    /// O(n)
    #[serde(rename = "O(n)")]
    Linear,
    /// O(n log n)
    #[serde(rename = "O(n log n)")]
    Linearithmic,
    /// O(n * period)
    #[serde(rename = "O(n*p)")]
    Windowed,
}

/// Time and space complexity metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complexity {
    /// Time cost.
    pub time: Cost,
    /// Extra space cost.
    pub space: Cost,
}

impl Default for Complexity {
    fn default() -> Self {
        Self {
            time: Cost::Linear,
            space: Cost::Linear,
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// Worth attention.
    Warning,
    /// Needs action.
    Critical,
}

/// A declared alert on an indicator.
#[derive(Clone)]
pub struct AlertSpec {
    /// Alert id, unique within the definition.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Severity.
    pub severity: Severity,
    /// Minimum seconds between two firings; 0 disables debouncing.
    pub cooldown_secs: u64,
    condition: AlertCondition,
    message: AlertMessage,
}

impl AlertSpec {
    /// Creates an alert.
    pub fn new<C, M>(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        cooldown_secs: u64,
        condition: C,
        message: M,
    ) -> Self
    where
        C: Fn(&ValueMap, &ValueMap, &Bar) -> bool + Send + Sync + 'static,
        M: Fn(&ValueMap, &Bar) -> String + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            cooldown_secs,
            condition: Arc::new(condition),
            message: Arc::new(message),
        }
    }

    /// Evaluates the condition.
    #[must_use]
    pub fn is_triggered(&self, current: &ValueMap, previous: &ValueMap, bar: &Bar) -> bool {
        (self.condition)(current, previous, bar)
    }

    /// Formats the alert message.
    #[must_use]
    pub fn format_message(&self, current: &ValueMap, bar: &Bar) -> String {
        (self.message)(current, bar)
    }
}

impl fmt::Debug for AlertSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertSpec")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("cooldown_secs", &self.cooldown_secs)
            .finish_non_exhaustive()
    }
}

/// Immutable descriptor of one indicator.
#[derive(Clone)]
pub struct IndicatorDefinition {
    id: String,
    name: String,
    category: Category,
    pane: Pane,
    outputs: Vec<OutputStyle>,
    params: ParamSchema,
    dependencies: Vec<String>,
    complexity: Complexity,
    y_range: Option<(f64, f64)>,
    horizontal_lines: Vec<f64>,
    kernel: Option<KernelId>,
    alerts: Vec<AlertSpec>,
    warmup: WarmupFn,
    calculate: CalculateFn,
}

impl IndicatorDefinition {
    /// Creates a definition with no outputs, parameters or dependencies and
    /// a warmup of zero.
    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        pane: Pane,
        calculate: F,
    ) -> Self
    where
        F: Fn(&[Bar], &Params) -> Result<MultiSeriesOutput> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            pane,
            outputs: Vec::new(),
            params: ParamSchema::new(),
            dependencies: Vec::new(),
            complexity: Complexity::default(),
            y_range: None,
            horizontal_lines: Vec::new(),
            kernel: None,
            alerts: Vec::new(),
            warmup: Arc::new(|_| 0),
            calculate: Arc::new(calculate),
        }
    }

    /// Appends an output style.
    #[must_use]
    pub fn output(mut self, style: OutputStyle) -> Self {
        self.outputs.push(style);
        self
    }

    /// Declares a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params = self.params.with(name, spec);
        self
    }

    /// Declares an ordering-only dependency.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    /// Sets the warmup function.
    #[must_use]
    pub fn warmup<W>(mut self, warmup: W) -> Self
    where
        W: Fn(&Params) -> usize + Send + Sync + 'static,
    {
        self.warmup = Arc::new(warmup);
        self
    }

    /// Sets complexity metadata.
    #[must_use]
    pub const fn complexity(mut self, time: Cost, space: Cost) -> Self {
        self.complexity = Complexity { time, space };
        self
    }

    /// Sets a fixed value range hint.
    #[must_use]
    pub const fn y_range(mut self, min: f64, max: f64) -> Self {
        self.y_range = Some((min, max));
        self
    }

    /// Adds a horizontal guide line.
    #[must_use]
    pub fn horizontal_line(mut self, level: f64) -> Self {
        self.horizontal_lines.push(level);
        self
    }

    /// Attaches an accelerated kernel.
    #[must_use]
    pub const fn kernel(mut self, kernel: KernelId) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Declares an alert.
    #[must_use]
    pub fn alert(mut self, alert: AlertSpec) -> Self {
        self.alerts.push(alert);
        self
    }

    /// Definition id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Target pane.
    #[must_use]
    pub const fn pane(&self) -> Pane {
        self.pane
    }

    /// Declared outputs in order; the first one is the primary output.
    #[must_use]
    pub fn outputs(&self) -> &[OutputStyle] {
        &self.outputs
    }

    /// Name of the primary output.
    #[must_use]
    pub fn primary_output(&self) -> Option<&str> {
        self.outputs.first().map(|o| o.name.as_str())
    }

    /// Parameter schema.
    #[must_use]
    pub const fn params(&self) -> &ParamSchema {
        &self.params
    }

    /// Ids scheduled before this one.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Complexity metadata.
    #[must_use]
    pub const fn complexity_info(&self) -> Complexity {
        self.complexity
    }

    /// Fixed value range hint.
    #[must_use]
    pub const fn y_range_hint(&self) -> Option<(f64, f64)> {
        self.y_range
    }

    /// Horizontal guide levels.
    #[must_use]
    pub fn horizontal_lines(&self) -> &[f64] {
        &self.horizontal_lines
    }

    /// Accelerated kernel, if any.
    #[must_use]
    pub const fn kernel_id(&self) -> Option<KernelId> {
        self.kernel
    }

    /// Declared alerts.
    #[must_use]
    pub fn alerts(&self) -> &[AlertSpec] {
        &self.alerts
    }

    /// Merges `overrides` over the schema defaults.
    ///
    /// # Errors
    ///
    /// See [`ParamSchema::resolve`].
    pub fn resolve_params(&self, overrides: &Params) -> Result<Params> {
        self.params.resolve(overrides)
    }

    /// Number of leading empty samples on the primary output for the given
    /// overrides. Invalid overrides fall back to the defaults.
    #[must_use]
    pub fn warmup_period(&self, overrides: &Params) -> usize {
        let params = self
            .resolve_params(overrides)
            .unwrap_or_else(|_| self.params.defaults());
        (self.warmup)(&params)
    }

    /// Runs the formula.
    ///
    /// Panics inside the formula are caught and reported as
    /// [`Error::Computation`]. Every declared output must be present and as
    /// long as `bars`.
    ///
    /// # Errors
    ///
    /// - [`Error::InsufficientData`] if `bars` is empty.
    /// - [`Error::InvalidParams`] if the overrides fail validation.
    /// - [`Error::Computation`] if the formula fails, panics, or returns a
    ///   malformed output set.
    pub fn calculate(&self, bars: &[Bar], overrides: &Params) -> Result<MultiSeriesOutput> {
        if bars.is_empty() {
            return Err(Error::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        let params = self.resolve_params(overrides)?;
        let output = catch_unwind(AssertUnwindSafe(|| (self.calculate)(bars, &params)))
            .map_err(|payload| Error::computation(panic_message(&*payload)))??;

        for style in &self.outputs {
            match output.get(&style.name) {
                Some(series) if series.len() == bars.len() => {}
                Some(series) => {
                    return Err(Error::computation(format!(
                        "output `{}` has {} samples for {} bars",
                        style.name,
                        series.len(),
                        bars.len()
                    )))
                }
                None => {
                    return Err(Error::computation(format!(
                        "output `{}` missing from `{}`",
                        style.name, self.id
                    )))
                }
            }
        }
        Ok(output)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "indicator panicked".to_owned())
}

impl fmt::Debug for IndicatorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorDefinition")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("pane", &self.pane)
            .field("outputs", &self.outputs)
            .field("dependencies", &self.dependencies)
            .field("kernel", &self.kernel)
            .field("alerts", &self.alerts)
            .finish_non_exhaustive()
    }
}
