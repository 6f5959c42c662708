//! Geometry composition for an external rasterizer.
//!
//! Computed series, the close price and trade markers are mapped into
//! pane-relative device coordinates and emitted as line-list [`Vertex`]
//! batches (`x, y, r, g, b, a`; 24 bytes per vertex).
//!
//! # Example
//!
//! ```
//! use mochart::geometry::{GeometryComposer, PaneLayout};
//! use mochart::plan::{IndicatorInstance, Params, Registry, Scheduler};
//! use mochart::series::Bar;
//!
//! let registry = Registry::with_builtins();
//! let bars: Vec<Bar> = (0..40)
//!     .map(|i| {
//!         let c = 50.0 + f64::from(i % 5);
//!         Bar::new(i64::from(i), c, c + 1.0, c - 1.0, c, 10.0)
//!     })
//!     .collect();
//! let computation = Scheduler::new(&registry)
//!     .compute_default(&bars, &[IndicatorInstance::new("sma", Params::new())]);
//!
//! let layout = PaneLayout::default();
//! let geometry = GeometryComposer::new(&layout, 0.01).compose(&bars, &computation, &registry, &[]);
//! assert_eq!(geometry.to_f32_buffer().len(), geometry.vertex_count() * 6);
//! ```

pub mod color;
pub mod composer;
pub mod layout;
pub mod markers;

pub use composer::{BatchSource, Geometry, GeometryComposer, Vertex, VertexBatch};
pub use layout::{PaneLayout, PaneRect};
pub use markers::{MarkerShape, TradeMarker, TradeMarkerKind};
