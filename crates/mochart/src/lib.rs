//! mochart: indicator computation and chart geometry composition
//!
//! This crate computes technical indicators over OHLCV bars and turns the
//! results into line-list vertex geometry for an external rasterizer.
//!
//! # Features
//!
//! - **Catalog**: 20 built-in indicators behind one definition contract
//! - **Registry**: per-chart, extensible, with dependency ordering and
//!   cycle detection
//! - **Two paths**: a synchronous default path and an asynchronous
//!   accelerated path over flat `f32` buffers that agree numerically
//! - **Geometry**: pane-relative vertices for lines, histograms, markers,
//!   guide lines and trade markers
//! - **Alerts**: declarative conditions with per-definition or
//!   per-instance cooldowns
//!
//! # Quick Start
//!
//! ```
//! use mochart::prelude::*;
//!
//! let bars: Vec<Bar> = (0..50)
//!     .map(|i| {
//!         let c = 100.0 + f64::from(i % 7);
//!         Bar::new(i64::from(i) * 60_000, c, c + 1.0, c - 1.0, c, 1_000.0)
//!     })
//!     .collect();
//!
//! let mut chart = Chart::new(bars, ChartConfig::default());
//! let id = chart.add_indicator("rsi", Params::new().with("period", 14)).unwrap();
//!
//! let rsi = chart.computation().get(&id).unwrap().output().unwrap();
//! // First 14 values are empty (warmup)
//! assert_eq!(rsi.value_at("rsi", 13), None);
//! assert!(rsi.value_at("rsi", 14).is_some());
//!
//! // Geometry is ready for upload: 6 floats per vertex
//! let buffer = chart.geometry().to_f32_buffer();
//! assert_eq!(buffer.len(), chart.geometry().vertex_count() * 6);
//! ```
//!
//! # Error Handling
//!
//! A failing instance never fails the chart. Its error is kept next to the
//! other results and it contributes no geometry:
//!
//! ```
//! use mochart::prelude::*;
//!
//! let bars = vec![Bar::new(0, 1.0, 1.0, 1.0, 1.0, 1.0); 5];
//! let mut chart = Chart::new(bars, ChartConfig::default());
//! let id = chart.add_indicator("rsi", Params::new().with("period", 1)).unwrap();
//!
//! let err = chart.computation().get(&id).unwrap().result.clone().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidParams);
//! assert!(chart.geometry().batches.iter().all(|b| b.pane == Pane::Main));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::nursery)]
#![warn(clippy::needless_collect)]
#![warn(clippy::or_fun_call)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod chart;
pub mod config;
pub mod error;
pub mod geometry;
pub mod indicators;
pub mod kernels;
pub mod plan;
pub mod prelude;
pub mod series;

// Re-export commonly used types at crate root
pub use chart::Chart;
pub use config::ChartConfig;
pub use error::{Error, ErrorKind, Result};
pub use series::{Bar, MultiSeriesOutput, Series};
