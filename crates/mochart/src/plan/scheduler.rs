//! Computation scheduling over active indicator instances.
//!
//! The [`Scheduler`] runs every enabled [`IndicatorInstance`] over a bar
//! slice in dependency order and aggregates per-pane value ranges. It has
//! two paths that produce the same [`Computation`] shape:
//!
//! - [`Scheduler::compute_default`]: synchronous, calls each formula.
//! - [`Scheduler::compute_accelerated`]: asynchronous, submits kernel-backed
//!   instances to an [`AcceleratedBackend`] one at a time and computes the
//!   rest on the default path inside the same pass.
//!
//! Failures are recorded per instance; one failing instance never aborts
//! the others, and failed instances are excluded from the ranges.
//!
//! # Example
//!
//! ```
//! use mochart::plan::scheduler::{IndicatorInstance, Scheduler};
//! use mochart::plan::{Params, Registry};
//! use mochart::series::Bar;
//!
//! let registry = Registry::with_builtins();
//! let bars: Vec<Bar> = (0..50)
//!     .map(|i| {
//!         let c = 100.0 + f64::from(i);
//!         Bar::new(i64::from(i) * 60_000, c, c + 1.0, c - 1.0, c, 1_000.0)
//!     })
//!     .collect();
//! let instances = [
//!     IndicatorInstance::new("macd", Params::new()),
//!     IndicatorInstance::new("ema", Params::new().with("period", 10)),
//! ];
//!
//! let computation = Scheduler::new(&registry).compute_default(&bars, &instances);
//! // `ema` is scheduled before `macd`.
//! assert_eq!(computation.outputs[0].definition_id, "ema");
//! assert!(computation.outputs.iter().all(|o| o.result.is_ok()));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::kernels::{deinterleave, AcceleratedBackend, BarBuffer, KernelId, KernelRequest};
use crate::plan::definition::{IndicatorDefinition, Pane};
use crate::plan::params::Params;
use crate::plan::registry::Registry;
use crate::series::{Bar, MultiSeriesOutput};

/// One active use of a definition with its own parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorInstance {
    /// Registered definition id.
    pub definition_id: String,
    /// Unique instance id.
    pub instance_id: String,
    /// Disabled instances are skipped.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Parameter overrides.
    #[serde(default)]
    pub params: Params,
}

const fn enabled_default() -> bool {
    true
}

impl IndicatorInstance {
    /// Creates an enabled instance with a fresh `ind_<uuid>` id.
    #[must_use]
    pub fn new(definition_id: impl Into<String>, params: Params) -> Self {
        Self::with_id(definition_id, format!("ind_{}", Uuid::new_v4()), params)
    }

    /// Creates an enabled instance with an explicit id.
    #[must_use]
    pub fn with_id(definition_id: impl Into<String>, instance_id: impl Into<String>, params: Params) -> Self {
        Self {
            definition_id: definition_id.into(),
            instance_id: instance_id.into(),
            enabled: true,
            params,
        }
    }
}

/// Result of one instance within a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOutput {
    /// Instance id.
    pub instance_id: String,
    /// Definition id.
    pub definition_id: String,
    /// Pane of the definition; [`Pane::Main`] if the definition is unknown.
    pub pane: Pane,
    /// Computed outputs or the failure.
    pub result: Result<MultiSeriesOutput>,
}

impl InstanceOutput {
    /// The outputs, if the instance succeeded.
    #[must_use]
    pub fn output(&self) -> Option<&MultiSeriesOutput> {
        self.result.as_ref().ok()
    }
}

/// A non-degenerate value range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound, always greater than `min`.
    pub max: f64,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ValueRange {
    /// Builds a range, widening `min == max` to `min - 1..max + 1`.
    /// Non-finite bounds give the default `0..1`.
    #[must_use]
    pub fn normalize(min: f64, max: f64) -> Self {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Self::default();
        }
        if min == max {
            return Self {
                min: min - 1.0,
                max: max + 1.0,
            };
        }
        Self { min, max }
    }

    /// Range over the finite values of `values`.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self::normalize(min, max)
    }

    /// `max - min`.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Returns `true` if `value` lies inside the closed range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Value range per pane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaneRanges {
    ranges: BTreeMap<Pane, ValueRange>,
}

impl PaneRanges {
    /// Range of `pane`; panes with no data get `0..1`.
    #[must_use]
    pub fn get(&self, pane: Pane) -> ValueRange {
        self.ranges.get(&pane).copied().unwrap_or_default()
    }

    /// Sets the range of `pane`.
    pub fn set(&mut self, pane: Pane, range: ValueRange) {
        self.ranges.insert(pane, range);
    }

    /// Computes ranges: main from the bar lows and highs, each sub-pane from
    /// every finite sample of every successful output assigned to it.
    #[must_use]
    pub fn aggregate(bars: &[Bar], outputs: &[InstanceOutput]) -> Self {
        let mut ranges = Self::default();
        ranges.set(
            Pane::Main,
            ValueRange::from_values(bars.iter().flat_map(|b| [b.low, b.high])),
        );
        for pane in Pane::ALL.into_iter().filter(|p| !p.is_main()) {
            let values = outputs
                .iter()
                .filter(|o| o.pane == pane)
                .filter_map(InstanceOutput::output)
                .flat_map(MultiSeriesOutput::finite_values);
            ranges.set(pane, ValueRange::from_values(values));
        }
        ranges
    }
}

/// Everything one pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Computation {
    /// One entry per enabled instance, in execution order.
    pub outputs: Vec<InstanceOutput>,
    /// Aggregated pane ranges.
    pub ranges: PaneRanges,
}

impl Computation {
    fn new(bars: &[Bar], outputs: Vec<InstanceOutput>) -> Self {
        let ranges = PaneRanges::aggregate(bars, &outputs);
        Self { outputs, ranges }
    }

    /// Looks up the result of an instance.
    #[must_use]
    pub fn get(&self, instance_id: &str) -> Option<&InstanceOutput> {
        self.outputs.iter().find(|o| o.instance_id == instance_id)
    }

    /// Iterates over successful instances with their outputs.
    pub fn successful(&self) -> impl Iterator<Item = (&InstanceOutput, &MultiSeriesOutput)> {
        self.outputs.iter().filter_map(|o| o.output().map(|out| (o, out)))
    }

    /// Iterates over failed instances with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&InstanceOutput, &Error)> {
        self.outputs
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }
}

/// Runs instances against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    registry: &'a Registry,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler over `registry`.
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Orders the enabled instances by dependency.
    ///
    /// Instances are stably sorted by the position of their definition id in
    /// the resolved order. If resolution fails the original order is kept.
    #[must_use]
    pub fn execution_order<'i>(&self, instances: &'i [IndicatorInstance]) -> Vec<&'i IndicatorInstance> {
        let mut ids: Vec<&str> = Vec::with_capacity(instances.len());
        for instance in instances {
            if !ids.contains(&instance.definition_id.as_str()) {
                ids.push(&instance.definition_id);
            }
        }

        let mut ordered: Vec<&IndicatorInstance> = instances.iter().filter(|i| i.enabled).collect();
        match self.registry.resolve_dependencies(&ids) {
            Ok(order) => {
                let position: HashMap<&str, usize> = order
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (id.as_str(), i))
                    .collect();
                ordered.sort_by_key(|i| position.get(i.definition_id.as_str()).copied().unwrap_or(usize::MAX));
            }
            Err(err) => {
                warn!(error = %err, "dependency resolution failed, using instance order");
            }
        }
        ordered
    }

    /// Computes every enabled instance on the default path.
    #[must_use]
    pub fn compute_default(&self, bars: &[Bar], instances: &[IndicatorInstance]) -> Computation {
        let start = Instant::now();
        let outputs: Vec<InstanceOutput> = self
            .execution_order(instances)
            .into_iter()
            .map(|instance| self.run_default(bars, instance))
            .collect();
        debug!(
            bars = bars.len(),
            instances = outputs.len(),
            elapsed_us = start.elapsed().as_micros(),
            "default pass complete"
        );
        Computation::new(bars, outputs)
    }

    /// Computes every enabled instance, dispatching kernel-backed ones to
    /// `backend`.
    ///
    /// Submissions are awaited one at a time in execution order. A backend
    /// failure is recorded as [`Error::AcceleratedPath`] for that instance
    /// only.
    pub async fn compute_accelerated(
        &self,
        bars: &[Bar],
        instances: &[IndicatorInstance],
        backend: &dyn AcceleratedBackend,
    ) -> Computation {
        let start = Instant::now();
        let buffer = BarBuffer::from_bars(bars);
        let mut outputs = Vec::with_capacity(instances.len());
        for instance in self.execution_order(instances) {
            let output = match self.registry.get(&instance.definition_id) {
                Some(def) => match def.kernel_id() {
                    Some(kernel) => {
                        let result = dispatch(def, kernel, instance, &buffer, backend).await;
                        if let Err(err) = &result {
                            warn!(
                                instance = %instance.instance_id,
                                backend = backend.name(),
                                error = %err,
                                "accelerated instance failed"
                            );
                        }
                        instance_output(instance, def.pane(), result)
                    }
                    None => self.run_default(bars, instance),
                },
                None => self.run_default(bars, instance),
            };
            outputs.push(output);
        }
        debug!(
            bars = bars.len(),
            instances = outputs.len(),
            backend = backend.name(),
            elapsed_us = start.elapsed().as_micros(),
            "accelerated pass complete"
        );
        Computation::new(bars, outputs)
    }

    fn run_default(&self, bars: &[Bar], instance: &IndicatorInstance) -> InstanceOutput {
        let Some(def) = self.registry.get(&instance.definition_id) else {
            let err = Error::IndicatorNotFound {
                id: instance.definition_id.clone(),
            };
            warn!(instance = %instance.instance_id, error = %err, "instance skipped");
            return instance_output(instance, Pane::Main, Err(err));
        };
        let result = def.calculate(bars, &instance.params);
        if let Err(err) = &result {
            warn!(instance = %instance.instance_id, error = %err, "instance failed");
        }
        instance_output(instance, def.pane(), result)
    }
}

fn instance_output(instance: &IndicatorInstance, pane: Pane, result: Result<MultiSeriesOutput>) -> InstanceOutput {
    InstanceOutput {
        instance_id: instance.instance_id.clone(),
        definition_id: instance.definition_id.clone(),
        pane,
        result,
    }
}

async fn dispatch(
    def: &IndicatorDefinition,
    kernel: KernelId,
    instance: &IndicatorInstance,
    buffer: &BarBuffer,
    backend: &dyn AcceleratedBackend,
) -> Result<MultiSeriesOutput> {
    if buffer.is_empty() {
        return Err(Error::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    let names: Vec<&str> = def.outputs().iter().map(|o| o.name.as_str()).collect();
    if names.len() != kernel.output_count() {
        return Err(Error::accelerated(format!(
            "`{}` declares {} outputs, kernel writes {}",
            def.id(),
            names.len(),
            kernel.output_count()
        )));
    }
    let params = def.resolve_params(&instance.params)?;
    let block = kernel.layout().pack(&params, buffer.len())?;
    let request = KernelRequest::new(kernel, buffer, block);
    let expected = request.output_len();
    let out = backend.dispatch(request).await?;
    if out.len() != expected {
        return Err(Error::accelerated(format!(
            "backend returned {} values, expected {expected}",
            out.len()
        )));
    }
    deinterleave(&out, buffer.len(), &names)
}
