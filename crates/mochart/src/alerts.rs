//! Debounced alert evaluation.
//!
//! After each computation, every successful instance whose definition
//! declares alerts is inspected at the last bar. The latest and previous
//! value of each declared output are handed to the alert condition; when it
//! holds and the alert is not cooling down, an [`AlertEvent`] is delivered
//! to every subscriber.
//!
//! Firing state is keyed by `(definition id, alert id)` by default, so two
//! instances of one definition share a cooldown. [`CooldownScope::Instance`]
//! keys by instance id instead.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use mochart::alerts::{AlertEvaluator, CooldownScope};
//! use mochart::plan::{Params, Registry};
//! use mochart::series::Bar;
//!
//! let registry = Registry::with_builtins();
//! let squeeze = registry.get("squeeze_alert").unwrap();
//! let bars: Vec<Bar> = (0..30).map(|i| Bar::new(i64::from(i), 10.0, 10.0, 10.0, 10.0, 1.0)).collect();
//! let output = squeeze.calculate(&bars, &Params::new()).unwrap();
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let mut evaluator = AlertEvaluator::new(CooldownScope::Definition);
//! evaluator.subscribe(move |event| sink.lock().unwrap().push(event.message.clone()));
//!
//! evaluator.evaluate(squeeze, "sq", &output, &bars, 0);
//! evaluator.evaluate(squeeze, "sq", &output, &bars, 30_000);
//! assert_eq!(*seen.lock().unwrap(), vec!["Squeeze detected at price 10".to_owned()]);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::plan::definition::{IndicatorDefinition, Severity, ValueMap};
use crate::plan::registry::Registry;
use crate::plan::scheduler::Computation;
use crate::series::{Bar, MultiSeriesOutput};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock at `now_ms`.
    #[must_use]
    pub const fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    /// Sets the time.
    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Moves the time forward.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// What a cooldown is keyed by, besides the alert id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownScope {
    /// The definition id: instances of one definition share a cooldown.
    #[default]
    Definition,
    /// The instance id.
    Instance,
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Definition id.
    pub indicator_id: String,
    /// Alert id within the definition.
    pub alert_id: String,
    /// Instance that triggered.
    pub instance_id: String,
    /// Severity.
    pub severity: Severity,
    /// Formatted message.
    pub message: String,
}

/// Handle returned by [`AlertEvaluator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&AlertEvent) + Send + Sync>;

/// Evaluates alerts and fans events out to subscribers.
pub struct AlertEvaluator {
    scope: CooldownScope,
    last_fired: HashMap<(String, String), i64>,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_id: u64,
}

impl AlertEvaluator {
    /// Creates an evaluator with no subscribers and no firing history.
    #[must_use]
    pub fn new(scope: CooldownScope) -> Self {
        Self {
            scope,
            last_fired: HashMap::new(),
            subscribers: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Cooldown scope in use.
    #[must_use]
    pub const fn scope(&self) -> CooldownScope {
        self.scope
    }

    /// Changes the cooldown scope and forgets the firing history.
    pub fn set_scope(&mut self, scope: CooldownScope) {
        if scope != self.scope {
            self.scope = scope;
            self.last_fired.clear();
        }
    }

    /// Registers a callback for every future event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(id, Box::new(callback));
        id
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Last firing time recorded under `(key, alert_id)`, where `key` is a
    /// definition or instance id depending on the scope.
    #[must_use]
    pub fn last_fired(&self, key: &str, alert_id: &str) -> Option<i64> {
        self.last_fired
            .get(&(key.to_owned(), alert_id.to_owned()))
            .copied()
    }

    /// Evaluates the alerts of every successful instance in `computation`.
    pub fn evaluate_computation(
        &mut self,
        registry: &Registry,
        computation: &Computation,
        bars: &[Bar],
        now_ms: i64,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        for (instance, output) in computation.successful() {
            if let Some(def) = registry.get(&instance.definition_id) {
                events.extend(self.evaluate(def, &instance.instance_id, output, bars, now_ms));
            }
        }
        events
    }

    /// Evaluates the alerts declared by `def` against one instance output
    /// and delivers the events that fire.
    pub fn evaluate(
        &mut self,
        def: &IndicatorDefinition,
        instance_id: &str,
        output: &MultiSeriesOutput,
        bars: &[Bar],
        now_ms: i64,
    ) -> Vec<AlertEvent> {
        let Some((last, bar)) = bars.len().checked_sub(1).zip(bars.last()) else {
            return Vec::new();
        };
        if def.alerts().is_empty() {
            return Vec::new();
        }

        let mut current = ValueMap::new();
        let mut previous = ValueMap::new();
        for style in def.outputs() {
            current.insert(style.name.clone(), output.value_at(&style.name, last));
            let prev = last.checked_sub(1).and_then(|i| output.value_at(&style.name, i));
            previous.insert(style.name.clone(), prev);
        }

        let key_owner = match self.scope {
            CooldownScope::Definition => def.id(),
            CooldownScope::Instance => instance_id,
        };
        let mut events = Vec::new();
        for alert in def.alerts() {
            let key = (key_owner.to_owned(), alert.id.clone());
            if alert.cooldown_secs > 0 {
                if let Some(&fired_at) = self.last_fired.get(&key) {
                    let cooldown_ms = i64::try_from(alert.cooldown_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                    if now_ms.saturating_sub(fired_at) < cooldown_ms {
                        continue;
                    }
                }
            }
            if !alert.is_triggered(&current, &previous, bar) {
                continue;
            }
            let event = AlertEvent {
                indicator_id: def.id().to_owned(),
                alert_id: alert.id.clone(),
                instance_id: instance_id.to_owned(),
                severity: alert.severity,
                message: alert.format_message(&current, bar),
            };
            debug!(indicator = %event.indicator_id, alert = %event.alert_id, "alert fired");
            self.last_fired.insert(key, now_ms);
            for subscriber in self.subscribers.values() {
                subscriber(&event);
            }
            events.push(event);
        }
        events
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(CooldownScope::default())
    }
}

impl fmt::Debug for AlertEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertEvaluator")
            .field("scope", &self.scope)
            .field("last_fired", &self.last_fired)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::plan::definition::{AlertSpec, Category, OutputStyle, Pane, PlotStyle, ZLayer};

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(i as i64, 1.0, 1.0, 1.0, 1.0 + i as f64, 1.0))
            .collect()
    }

    fn crossing(cooldown: u64) -> IndicatorDefinition {
        IndicatorDefinition::new("cross", "Cross", Category::Custom, Pane::Sub1, |_, _| unreachable!())
            .output(OutputStyle::new("v", "#FFF", PlotStyle::Line, ZLayer::Line))
            .alert(AlertSpec::new(
                "above",
                "Above",
                Severity::Info,
                cooldown,
                |cur, prev, _| {
                    matches!((cur.get("v").copied().flatten(), prev.get("v").copied().flatten()),
                        (Some(c), Some(p)) if c > 0.0 && p <= 0.0)
                },
                |cur, bar| format!("v={:?} close={}", cur["v"], bar.close),
            ))
    }

    fn output(values: Vec<Option<f64>>) -> MultiSeriesOutput {
        MultiSeriesOutput::new().with("v", values)
    }

    #[test]
    fn test_condition_sees_current_and_previous() {
        let mut evaluator = AlertEvaluator::default();
        let def = crossing(0);
        let data = bars(3);
        let fired = evaluator.evaluate(&def, "i", &output(vec![None, Some(-1.0), Some(2.0)]), &data, 0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].message, "v=Some(2.0) close=3");
        assert_eq!(fired[0].indicator_id, "cross");
        assert_eq!(fired[0].instance_id, "i");

        let quiet = evaluator.evaluate(&def, "i", &output(vec![None, Some(1.0), Some(2.0)]), &data, 0);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_cooldown_debounces() {
        let mut evaluator = AlertEvaluator::default();
        let def = crossing(60);
        let data = bars(2);
        let out = output(vec![Some(-1.0), Some(1.0)]);
        assert_eq!(evaluator.evaluate(&def, "i", &out, &data, 1_000).len(), 1);
        assert!(evaluator.evaluate(&def, "i", &out, &data, 30_000).is_empty());
        assert!(evaluator.evaluate(&def, "i", &out, &data, 60_999).is_empty());
        assert_eq!(evaluator.evaluate(&def, "i", &out, &data, 61_000).len(), 1);
        assert_eq!(evaluator.last_fired("cross", "above"), Some(61_000));
    }

    #[test]
    fn test_zero_cooldown_always_fires() {
        let mut evaluator = AlertEvaluator::default();
        let def = crossing(0);
        let out = output(vec![Some(-1.0), Some(1.0)]);
        for _ in 0..3 {
            assert_eq!(evaluator.evaluate(&def, "i", &out, &bars(2), 5).len(), 1);
        }
    }

    #[test]
    fn test_definition_scope_shares_cooldown() {
        let mut evaluator = AlertEvaluator::new(CooldownScope::Definition);
        let def = crossing(60);
        let out = output(vec![Some(-1.0), Some(1.0)]);
        assert_eq!(evaluator.evaluate(&def, "a", &out, &bars(2), 0).len(), 1);
        assert!(evaluator.evaluate(&def, "b", &out, &bars(2), 0).is_empty());
    }

    #[test]
    fn test_instance_scope_separates_cooldown() {
        let mut evaluator = AlertEvaluator::new(CooldownScope::Instance);
        let def = crossing(60);
        let out = output(vec![Some(-1.0), Some(1.0)]);
        assert_eq!(evaluator.evaluate(&def, "a", &out, &bars(2), 0).len(), 1);
        assert_eq!(evaluator.evaluate(&def, "b", &out, &bars(2), 0).len(), 1);
        assert!(evaluator.evaluate(&def, "a", &out, &bars(2), 0).is_empty());
    }

    #[test]
    fn test_single_bar_has_no_previous() {
        let mut evaluator = AlertEvaluator::default();
        let def = crossing(0);
        assert!(evaluator
            .evaluate(&def, "i", &output(vec![Some(1.0)]), &bars(1), 0)
            .is_empty());
        assert!(evaluator.evaluate(&def, "i", &output(vec![]), &[], 0).is_empty());
    }

    #[test]
    fn test_subscribers() {
        let mut evaluator = AlertEvaluator::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = evaluator.subscribe(move |e| sink.lock().unwrap().push(e.alert_id.clone()));
        let other = evaluator.subscribe(|_| {});
        assert_eq!(evaluator.subscriber_count(), 2);

        let def = crossing(0);
        let out = output(vec![Some(-1.0), Some(1.0)]);
        evaluator.evaluate(&def, "i", &out, &bars(2), 0);
        assert!(evaluator.unsubscribe(id));
        assert!(!evaluator.unsubscribe(id));
        evaluator.evaluate(&def, "i", &out, &bars(2), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["above".to_owned()]);
        assert!(evaluator.unsubscribe(other));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(1);
        assert_eq!(clock.now_ms(), 1);
        assert!(SystemClock.now_ms() > 0);
    }
}
