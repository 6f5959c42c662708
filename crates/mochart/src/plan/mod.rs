//! Planning and executing indicator computations.
//!
//! # Architecture
//!
//! 1. **IndicatorDefinition** ([`definition`]): the contract every indicator
//!    satisfies: outputs, parameter schema, dependencies, warmup, formula.
//! 2. **Registry** ([`registry`]): stores definitions by id and resolves
//!    execution order with cycle detection.
//! 3. **DependencyGraph** ([`dag`]): petgraph view of a whole registry, used
//!    for validation.
//! 4. **Scheduler** ([`scheduler`]): runs active instances on the default
//!    or accelerated path and aggregates pane ranges.
//!
//! ```
//! use mochart::plan::{IndicatorInstance, Params, Registry, Scheduler};
//! use mochart::series::Bar;
//!
//! let registry = Registry::with_builtins();
//! let bars: Vec<Bar> = (0..30)
//!     .map(|i| Bar::new(i64::from(i), 10.0, 11.0, 9.0, 10.0 + f64::from(i % 3), 100.0))
//!     .collect();
//!
//! let computation = Scheduler::new(&registry)
//!     .compute_default(&bars, &[IndicatorInstance::new("rsi", Params::new())]);
//! let range = computation.ranges.get(mochart::plan::Pane::Sub1);
//! assert!(range.min < range.max);
//! ```

pub mod dag;
pub mod definition;
pub mod params;
pub mod registry;
pub mod scheduler;

pub use dag::DependencyGraph;
pub use definition::{
    AlertSpec, Category, IndicatorDefinition, OutputStyle, Pane, PlotStyle, Severity, ValueMap, ZLayer,
};
pub use params::{ParamSchema, ParamSpec, ParamValue, Params};
pub use registry::Registry;
pub use scheduler::{Computation, IndicatorInstance, InstanceOutput, PaneRanges, Scheduler, ValueRange};
