//! Commonly used types and traits for convenient importing.
//!
//! # Usage
//!
//! ```
//! use mochart::prelude::*;
//!
//! let registry = Registry::with_builtins();
//! let def = registry.get("bb").unwrap();
//! assert_eq!(def.pane(), Pane::Main);
//! assert_eq!(def.outputs().len(), 4);
//! ```
//!
//! # Contents
//!
//! ## Error Handling
//! - [`Error`], [`ErrorKind`] and [`Result`]
//!
//! ## Data
//! - [`Bar`], [`Series`] and [`MultiSeriesOutput`]
//!
//! ## Definitions and Scheduling
//! - [`IndicatorDefinition`], [`Registry`], [`Scheduler`] and their
//!   supporting types
//!
//! ## Chart
//! - [`Chart`], [`ChartConfig`], alerts and geometry

// Error types
pub use crate::error::{Error, ErrorKind, Result};

// Bars and series
pub use crate::series::{Bar, MultiSeriesOutput, Series};

// Definitions
pub use crate::plan::{
    AlertSpec, Category, IndicatorDefinition, OutputStyle, Pane, ParamSpec, ParamValue, Params,
    PlotStyle, Severity, ZLayer,
};

// Registry and scheduling
pub use crate::plan::{Computation, IndicatorInstance, InstanceOutput, Registry, Scheduler, ValueRange};

// Accelerated path
pub use crate::kernels::{AcceleratedBackend, KernelId, SoftwareBackend};

// Geometry
pub use crate::geometry::{Geometry, GeometryComposer, PaneLayout, TradeMarker, TradeMarkerKind, Vertex};

// Alerts
pub use crate::alerts::{AlertEvaluator, AlertEvent, Clock, CooldownScope, ManualClock, SystemClock};

// Chart
pub use crate::chart::{AcceleratedOutcome, AcceleratedPass, Chart};
pub use crate::config::ChartConfig;
