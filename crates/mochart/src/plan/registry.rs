//! Indicator registry and dependency resolution.
//!
//! The registry stores [`IndicatorDefinition`]s by id and resolves the
//! execution order of a set of requested ids. It supports:
//!
//! - Registration by id (re-registering an id replaces the old definition)
//! - Lookup and filtered listing (by category, by accelerated kernel)
//! - Depth-first dependency resolution with cycle detection
//! - Whole-registry validation through [`DependencyGraph`]
//!
//! Each chart owns its own registry; there is no process-wide instance.
//!
//! # Example
//!
//! ```
//! use mochart::plan::Registry;
//!
//! let registry = Registry::with_builtins();
//! let order = registry.resolve_dependencies(["macd"]).unwrap();
//! assert_eq!(order, vec!["ema".to_owned(), "macd".to_owned()]);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::indicators;
use crate::plan::dag::DependencyGraph;
use crate::plan::definition::{Category, IndicatorDefinition};

/// Registry of indicator definitions.
///
/// Definitions are stored behind [`Arc`] so computations can hold on to a
/// snapshot while the registry keeps changing.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Map from definition id to definition.
    indicators: HashMap<String, Arc<IndicatorDefinition>>,
}

impl Registry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indicators: HashMap::with_capacity(capacity),
        }
    }

    /// Creates a registry holding every built-in indicator.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::with_capacity(indicators::BUILTIN_COUNT);
        indicators::register_builtins(&mut registry);
        registry
    }

    /// Registers a definition under its own id.
    ///
    /// An existing definition with the same id is replaced and returned.
    pub fn register(&mut self, definition: IndicatorDefinition) -> Option<Arc<IndicatorDefinition>> {
        let id = definition.id().to_owned();
        self.indicators.insert(id, Arc::new(definition))
    }

    /// Removes a definition.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<IndicatorDefinition>> {
        self.indicators.remove(id)
    }

    /// Returns the definition for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<IndicatorDefinition>> {
        self.indicators.get(id)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.indicators.contains_key(id)
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Iterates over registered ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.indicators.keys().map(String::as_str)
    }

    /// Iterates over `(id, definition)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<IndicatorDefinition>)> {
        self.indicators.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Lists every definition.
    #[must_use]
    pub fn list_all(&self) -> Vec<Arc<IndicatorDefinition>> {
        self.indicators.values().cloned().collect()
    }

    /// Lists definitions of one category.
    #[must_use]
    pub fn list_by_category(&self, category: Category) -> Vec<Arc<IndicatorDefinition>> {
        self.indicators
            .values()
            .filter(|def| def.category() == category)
            .cloned()
            .collect()
    }

    /// Lists definitions that carry an accelerated kernel.
    #[must_use]
    pub fn list_accelerated(&self) -> Vec<Arc<IndicatorDefinition>> {
        self.indicators
            .values()
            .filter(|def| def.kernel_id().is_some())
            .cloned()
            .collect()
    }

    /// Resolves the execution order for `ids`.
    ///
    /// Performs a depth-first post-order walk over the requested ids and
    /// their declared dependencies. Every dependency precedes its
    /// dependents; duplicates keep their first visit position.
    ///
    /// # Errors
    ///
    /// - [`Error::IndicatorNotFound`] if a requested or referenced id is not
    ///   registered.
    /// - [`Error::CircularDependency`] naming the id that was reached again
    ///   while still on the current path.
    pub fn resolve_dependencies<I, S>(&self, ids: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut walk = Walk::default();
        for id in ids {
            self.visit(id.as_ref(), &mut walk)?;
        }
        Ok(walk.order)
    }

    fn visit(&self, id: &str, walk: &mut Walk) -> Result<()> {
        if walk.visited.contains(id) {
            return Ok(());
        }
        if walk.visiting.contains(id) {
            return Err(Error::CircularDependency { id: id.to_owned() });
        }
        let def = self
            .indicators
            .get(id)
            .ok_or_else(|| Error::IndicatorNotFound { id: id.to_owned() })?;

        walk.visiting.insert(id.to_owned());
        for dep in def.dependencies() {
            self.visit(dep, walk)?;
        }
        walk.visiting.remove(id);
        walk.visited.insert(id.to_owned());
        walk.order.push(id.to_owned());
        Ok(())
    }

    /// Returns `(dependent, dependency)` pairs whose dependency is not
    /// registered.
    #[must_use]
    pub fn missing_dependencies(&self) -> Vec<(&str, &str)> {
        let indicators = &self.indicators;
        let mut missing: Vec<(&str, &str)> = indicators
            .iter()
            .flat_map(|(id, def)| {
                def.dependencies()
                    .iter()
                    .filter(move |dep| !indicators.contains_key(dep.as_str()))
                    .map(move |dep| (id.as_str(), dep.as_str()))
            })
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Validates the whole registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndicatorNotFound`] for the first missing dependency
    /// (in id order), or [`Error::CircularDependency`] if the registered
    /// dependency graph has a cycle.
    pub fn validate(&self) -> Result<()> {
        if let Some((_, dep)) = self.missing_dependencies().first() {
            return Err(Error::IndicatorNotFound {
                id: (*dep).to_owned(),
            });
        }
        DependencyGraph::from_registry(self).topological_order()?;
        Ok(())
    }
}

#[derive(Default)]
struct Walk {
    visiting: HashSet<String>,
    visited: HashSet<String>,
    order: Vec<String>,
}

impl FromIterator<IndicatorDefinition> for Registry {
    fn from_iter<I: IntoIterator<Item = IndicatorDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for def in iter {
            registry.register(def);
        }
        registry
    }
}
