//! The chart: composition root of the engine.
//!
//! A [`Chart`] owns one [`Registry`] (built-ins plus user extensions), the
//! bar array, the configuration, the last [`Computation`], the last
//! [`Geometry`] and the [`AlertEvaluator`]. Every mutating operation
//! replaces state wholesale, recomputes on the default path, recomposes
//! geometry and evaluates alerts. Trade marker edits only recompose
//! geometry. Reading never recomputes.
//!
//! # Accelerated passes
//!
//! The accelerated path is asynchronous and may finish after the chart has
//! moved on. Each mutation bumps a generation counter; a pass records the
//! generation it started from, and [`Chart::apply_accelerated`] drops the
//! outcome if the chart has changed since.
//!
//! ```
//! use futures::executor::block_on;
//! use mochart::prelude::*;
//!
//! let bars: Vec<Bar> = (0..60)
//!     .map(|i| {
//!         let c = 100.0 + (f64::from(i) * 0.2).sin();
//!         Bar::new(i64::from(i) * 60_000, c, c + 0.5, c - 0.5, c, 1_000.0)
//!     })
//!     .collect();
//! let mut chart = Chart::new(bars, ChartConfig::default());
//! chart.add_indicator("rsi", Params::new()).unwrap();
//!
//! let pass = chart.begin_accelerated_pass();
//! chart.add_indicator("sma", Params::new()).unwrap();
//! let outcome = block_on(pass.run(&SoftwareBackend::new()));
//! // The chart changed while the pass was running.
//! assert!(!chart.apply_accelerated(outcome));
//!
//! assert!(block_on(chart.recompute_accelerated(&SoftwareBackend::new())));
//! assert_eq!(chart.computation().outputs.len(), 2);
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use crate::alerts::{AlertEvent, AlertEvaluator, Clock, SubscriptionId, SystemClock};
use crate::config::ChartConfig;
use crate::error::{Error, Result};
use crate::geometry::composer::{Geometry, GeometryComposer};
use crate::geometry::markers::TradeMarker;
use crate::kernels::AcceleratedBackend;
use crate::plan::definition::IndicatorDefinition;
use crate::plan::params::Params;
use crate::plan::registry::Registry;
use crate::plan::scheduler::{Computation, IndicatorInstance, Scheduler};
use crate::series::Bar;

/// A chart over one bar series.
pub struct Chart {
    registry: Arc<Registry>,
    bars: Arc<[Bar]>,
    config: ChartConfig,
    computation: Computation,
    geometry: Geometry,
    evaluator: AlertEvaluator,
    clock: Arc<dyn Clock>,
    generation: u64,
}

impl Chart {
    /// Creates a chart with the built-in indicators and the system clock,
    /// then computes and composes.
    #[must_use]
    pub fn new(bars: Vec<Bar>, config: ChartConfig) -> Self {
        Self::with_clock(bars, config, Arc::new(SystemClock))
    }

    /// Like [`Chart::new`] with an explicit alert clock.
    #[must_use]
    pub fn with_clock(bars: Vec<Bar>, config: ChartConfig, clock: Arc<dyn Clock>) -> Self {
        let evaluator = AlertEvaluator::new(config.alerts.cooldown_scope);
        let mut chart = Self {
            registry: Arc::new(Registry::with_builtins()),
            bars: bars.into(),
            config,
            computation: Computation::default(),
            geometry: Geometry::default(),
            evaluator,
            clock,
            generation: 0,
        };
        chart.recompute();
        chart
    }

    /// The chart's registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a user indicator, replacing any same-id definition.
    ///
    /// A definition that leaves the registry with a missing dependency or
    /// a cycle is still registered; the problem is logged and scheduling
    /// degrades to instance order.
    pub fn register_indicator(&mut self, definition: IndicatorDefinition) -> Option<Arc<IndicatorDefinition>> {
        let id = definition.id().to_owned();
        let registry = Arc::make_mut(&mut self.registry);
        let previous = registry.register(definition);
        if let Err(err) = registry.validate() {
            warn!(indicator = %id, error = %err, "registry is inconsistent after registration");
        }
        self.recompute();
        previous
    }

    /// Current bars.
    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Replaces the bars.
    pub fn set_bars(&mut self, bars: Vec<Bar>) {
        self.bars = bars.into();
        self.recompute();
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: ChartConfig) {
        self.evaluator.set_scope(config.alerts.cooldown_scope);
        self.config = config;
        self.recompute();
    }

    /// Adds an enabled instance of `definition_id` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndicatorNotFound`] if the id is not registered.
    pub fn add_indicator(&mut self, definition_id: &str, params: Params) -> Result<String> {
        if !self.registry.contains(definition_id) {
            return Err(Error::IndicatorNotFound {
                id: definition_id.to_owned(),
            });
        }
        let instance = IndicatorInstance::new(definition_id, params);
        let instance_id = instance.instance_id.clone();
        self.config.indicators.push(instance);
        self.recompute();
        Ok(instance_id)
    }

    /// Removes an instance. Returns `false` if it did not exist.
    pub fn remove_indicator(&mut self, instance_id: &str) -> bool {
        let before = self.config.indicators.len();
        self.config.indicators.retain(|i| i.instance_id != instance_id);
        let removed = self.config.indicators.len() != before;
        if removed {
            self.recompute();
        }
        removed
    }

    /// Replaces the parameter overrides of an instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndicatorNotFound`] naming the instance id if no
    /// such instance exists.
    pub fn update_params(&mut self, instance_id: &str, params: Params) -> Result<()> {
        self.instance_mut(instance_id)?.params = params;
        self.recompute();
        Ok(())
    }

    /// Flips `enabled` on an instance and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndicatorNotFound`] naming the instance id if no
    /// such instance exists.
    pub fn toggle_visibility(&mut self, instance_id: &str) -> Result<bool> {
        let instance = self.instance_mut(instance_id)?;
        instance.enabled = !instance.enabled;
        let enabled = instance.enabled;
        self.recompute();
        Ok(enabled)
    }

    fn instance_mut(&mut self, instance_id: &str) -> Result<&mut IndicatorInstance> {
        self.config
            .indicators
            .iter_mut()
            .find(|i| i.instance_id == instance_id)
            .ok_or_else(|| Error::IndicatorNotFound {
                id: instance_id.to_owned(),
            })
    }

    /// Active instances, enabled or not.
    #[must_use]
    pub fn active_indicators(&self) -> &[IndicatorInstance] {
        &self.config.indicators
    }

    /// Appends trade markers.
    ///
    /// Markers do not feed any formula: the computation, the generation and
    /// alert state are left as they are and only geometry is recomposed.
    pub fn add_trade_markers<I: IntoIterator<Item = TradeMarker>>(&mut self, markers: I) {
        self.config.trade_markers.extend(markers);
        self.compose();
    }

    /// Removes every trade marker. Only geometry is recomposed.
    pub fn clear_trade_markers(&mut self) {
        self.config.trade_markers.clear();
        self.compose();
    }

    /// Subscribes to alert events.
    pub fn on_alert<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        self.evaluator.subscribe(callback)
    }

    /// Cancels a subscription. Returns `false` if it was not active.
    pub fn off_alert(&mut self, id: SubscriptionId) -> bool {
        self.evaluator.unsubscribe(id)
    }

    /// Geometry of the last applied computation.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Last applied computation.
    #[must_use]
    pub const fn computation(&self) -> &Computation {
        &self.computation
    }

    /// Generation of the current bars and configuration.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshots the current state for an accelerated pass.
    #[must_use]
    pub fn begin_accelerated_pass(&self) -> AcceleratedPass {
        AcceleratedPass {
            generation: self.generation,
            registry: Arc::clone(&self.registry),
            bars: Arc::clone(&self.bars),
            instances: self.config.indicators.clone(),
        }
    }

    /// Applies an accelerated outcome if it is still current. Returns
    /// `false`, leaving the chart untouched, for a stale outcome.
    pub fn apply_accelerated(&mut self, outcome: AcceleratedOutcome) -> bool {
        if outcome.generation != self.generation {
            warn!(
                pass = outcome.generation,
                current = self.generation,
                "discarding stale accelerated pass"
            );
            return false;
        }
        self.computation = outcome.computation;
        self.compose();
        self.evaluate_alerts();
        true
    }

    /// Runs an accelerated pass over the current state and applies it.
    pub async fn recompute_accelerated(&mut self, backend: &dyn AcceleratedBackend) -> bool {
        let outcome = self.begin_accelerated_pass().run(backend).await;
        self.apply_accelerated(outcome)
    }

    fn recompute(&mut self) {
        self.generation += 1;
        debug!(generation = self.generation, bars = self.bars.len(), "recomputing chart");
        self.computation = Scheduler::new(&self.registry).compute_default(&self.bars, &self.config.indicators);
        self.compose();
        self.evaluate_alerts();
    }

    fn compose(&mut self) {
        let layout = &self.config.layout;
        self.geometry = GeometryComposer::new(&layout.panes, layout.marker_scale).compose(
            &self.bars,
            &self.computation,
            &self.registry,
            &self.config.trade_markers,
        );
    }

    fn evaluate_alerts(&mut self) {
        let now = self.clock.now_ms();
        self.evaluator
            .evaluate_computation(&self.registry, &self.computation, &self.bars, now);
    }
}

impl std::fmt::Debug for Chart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chart")
            .field("bars", &self.bars.len())
            .field("indicators", &self.config.indicators.len())
            .field("generation", &self.generation)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

/// State captured for one accelerated pass.
#[derive(Debug, Clone)]
pub struct AcceleratedPass {
    generation: u64,
    registry: Arc<Registry>,
    bars: Arc<[Bar]>,
    instances: Vec<IndicatorInstance>,
}

impl AcceleratedPass {
    /// Generation the pass started from.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Computes the captured state on `backend`.
    pub async fn run(self, backend: &dyn AcceleratedBackend) -> AcceleratedOutcome {
        let computation = Scheduler::new(&self.registry)
            .compute_accelerated(&self.bars, &self.instances, backend)
            .await;
        AcceleratedOutcome {
            generation: self.generation,
            computation,
        }
    }
}

/// Result of an [`AcceleratedPass`].
#[derive(Debug, Clone)]
pub struct AcceleratedOutcome {
    generation: u64,
    computation: Computation,
}

impl AcceleratedOutcome {
    /// Generation the pass started from.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The computed outputs.
    #[must_use]
    pub const fn computation(&self) -> &Computation {
        &self.computation
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::executor::block_on;

    use super::*;
    use crate::alerts::{CooldownScope, ManualClock};
    use crate::error::ErrorKind;
    use crate::geometry::composer::BatchSource;
    use crate::geometry::markers::TradeMarkerKind;
    use crate::kernels::SoftwareBackend;
    use crate::plan::definition::{Category, OutputStyle, Pane, PlotStyle, ZLayer};

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.4).sin() * 3.0;
                Bar::new(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 500.0)
            })
            .collect()
    }

    fn flat(n: usize) -> Vec<Bar> {
        (0..n).map(|i| Bar::new(i as i64, 10.0, 10.0, 10.0, 10.0, 1.0)).collect()
    }

    #[test]
    fn test_new_chart_has_builtins_and_price_line() {
        let chart = Chart::new(bars(10), ChartConfig::default());
        assert_eq!(chart.registry().len(), crate::indicators::BUILTIN_COUNT);
        assert_eq!(chart.generation(), 1);
        assert!(chart.geometry().batches_from(&BatchSource::Price).next().is_some());
    }

    #[test]
    fn test_add_remove_indicator() {
        let mut chart = Chart::new(bars(40), ChartConfig::default());
        let id = chart.add_indicator("sma", Params::new().with("period", 5)).unwrap();
        assert!(id.starts_with("ind_"));
        assert!(chart.computation().get(&id).unwrap().result.is_ok());
        assert_eq!(chart.active_indicators().len(), 1);

        assert_eq!(
            chart.add_indicator("nope", Params::new()).unwrap_err().kind(),
            ErrorKind::IndicatorNotFound
        );
        assert!(chart.remove_indicator(&id));
        assert!(!chart.remove_indicator(&id));
        assert!(chart.computation().outputs.is_empty());
    }

    #[test]
    fn test_update_params_and_toggle() {
        let mut chart = Chart::new(bars(40), ChartConfig::default());
        let id = chart.add_indicator("rsi", Params::new()).unwrap();
        chart.update_params(&id, Params::new().with("period", 1)).unwrap();
        assert_eq!(
            chart.computation().get(&id).unwrap().result.as_ref().unwrap_err().kind(),
            ErrorKind::InvalidParams
        );

        assert!(!chart.toggle_visibility(&id).unwrap());
        assert!(chart.computation().get(&id).is_none());
        assert!(chart.toggle_visibility(&id).unwrap());
        assert!(chart.update_params("missing", Params::new()).is_err());
        assert!(chart.toggle_visibility("missing").is_err());
    }

    #[test]
    fn test_trade_markers() {
        let mut chart = Chart::new(bars(10), ChartConfig::default());
        chart.add_trade_markers([TradeMarker::new(TradeMarkerKind::StopLoss, 120_000, 100.0)]);
        let batch = chart
            .geometry()
            .batches_from(&BatchSource::TradeMarkers)
            .next()
            .unwrap();
        assert_eq!(batch.segment_count(), 2);
        chart.clear_trade_markers();
        assert!(chart.geometry().batches_from(&BatchSource::TradeMarkers).next().is_none());
    }

    #[test]
    fn test_trade_markers_only_recompose() {
        let clock = Arc::new(ManualClock::new(0));
        let mut chart = Chart::with_clock(flat(30), ChartConfig::default(), clock.clone());
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        chart.on_alert(move |_| *sink.lock().unwrap() += 1);
        chart.add_indicator("squeeze_alert", Params::new()).unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);

        let generation = chart.generation();
        let computation = chart.computation().clone();
        let pass = chart.begin_accelerated_pass();
        clock.advance(120_000);
        chart.add_trade_markers([TradeMarker::new(TradeMarkerKind::EntryLong, 5, 10.0)]);
        chart.clear_trade_markers();

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(chart.generation(), generation);
        assert_eq!(chart.computation(), &computation);
        assert!(chart.apply_accelerated(block_on(pass.run(&SoftwareBackend::new()))));
    }

    #[test]
    fn test_alerts_fire_with_cooldown() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let mut chart = Chart::with_clock(flat(30), ChartConfig::default(), clock.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = chart.on_alert(move |e| sink.lock().unwrap().push(e.alert_id.clone()));

        chart.add_indicator("squeeze_alert", Params::new()).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        clock.advance(10_000);
        chart.set_bars(flat(31));
        assert_eq!(seen.lock().unwrap().len(), 1);

        clock.advance(60_000);
        chart.set_bars(flat(32));
        assert_eq!(*seen.lock().unwrap(), vec!["squeeze_found", "squeeze_found"]);

        assert!(chart.off_alert(sub));
        clock.advance(60_000);
        chart.set_bars(flat(33));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_instance_scope_from_config() {
        let clock = Arc::new(ManualClock::new(0));
        let config = ChartConfig::default().with_cooldown_scope(CooldownScope::Instance);
        let mut chart = Chart::with_clock(flat(30), config, clock);
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        chart.on_alert(move |_| *sink.lock().unwrap() += 1);
        chart.add_indicator("squeeze_alert", Params::new()).unwrap();
        chart.add_indicator("squeeze_alert", Params::new()).unwrap();
        // First add fires once; second add fires only for the new instance.
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn test_register_user_indicator() {
        let mut chart = Chart::new(bars(10), ChartConfig::default());
        let def = IndicatorDefinition::new("close", "Close", Category::Custom, Pane::Sub3, |bars, _| {
            Ok(crate::series::MultiSeriesOutput::new().with("close", bars.iter().map(|b| Some(b.close)).collect()))
        })
        .output(OutputStyle::new("close", "#FFFFFF", PlotStyle::Line, ZLayer::Line));
        assert!(chart.register_indicator(def).is_none());
        let id = chart.add_indicator("close", Params::new()).unwrap();
        assert!(chart.computation().get(&id).unwrap().result.is_ok());
        let range = chart.computation().ranges.get(Pane::Sub3);
        assert!(range.min < range.max);
    }

    #[test]
    fn test_stale_pass_discarded() {
        let mut chart = Chart::new(bars(40), ChartConfig::default());
        chart.add_indicator("ema", Params::new()).unwrap();
        let pass = chart.begin_accelerated_pass();
        assert_eq!(pass.generation(), chart.generation());
        chart.set_bars(bars(41));
        let outcome = block_on(pass.run(&SoftwareBackend::new()));
        let before = chart.computation().clone();
        assert!(!chart.apply_accelerated(outcome));
        assert_eq!(chart.computation(), &before);
    }

    #[test]
    fn test_current_pass_applied() {
        let mut chart = Chart::new(bars(40), ChartConfig::default());
        let id = chart.add_indicator("bb", Params::new()).unwrap();
        let generation = chart.generation();
        assert!(block_on(chart.recompute_accelerated(&SoftwareBackend::new())));
        assert_eq!(chart.generation(), generation);
        let out = chart.computation().get(&id).unwrap().output().unwrap();
        assert!(out.value_at("middle", 39).is_some());
    }
}
