//! Chart configuration.
//!
//! A [`ChartConfig`] is the wholesale description of what a chart shows:
//! the active indicator instances, external trade markers, pane layout and
//! alert behavior. Every field has a default, so a partial JSON document is
//! enough.
//!
//! # Example
//!
//! ```
//! use mochart::alerts::CooldownScope;
//! use mochart::config::ChartConfig;
//!
//! let config = ChartConfig::from_json(
//!     r#"{
//!         "indicators": [
//!             {"definitionId": "rsi", "instanceId": "rsi-14", "params": {"period": 14}}
//!         ],
//!         "alerts": {"cooldownScope": "instance"}
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.indicators.len(), 1);
//! assert!(config.indicators[0].enabled);
//! assert_eq!(config.alerts.cooldown_scope, CooldownScope::Instance);
//! assert!((config.layout.marker_scale - 0.01).abs() < f64::EPSILON);
//! ```

use serde::{Deserialize, Serialize};

use crate::alerts::CooldownScope;
use crate::geometry::layout::PaneLayout;
use crate::geometry::markers::TradeMarker;
use crate::plan::scheduler::IndicatorInstance;

/// Default trade marker scale: marker sizes are multiplied by this to get
/// device units.
pub const DEFAULT_MARKER_SCALE: f64 = 0.01;

/// Pane placement and marker sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Pane placement.
    pub panes: PaneLayout,
    /// Trade marker size multiplier.
    pub marker_scale: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            panes: PaneLayout::default(),
            marker_scale: DEFAULT_MARKER_SCALE,
        }
    }
}

/// Alert behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertConfig {
    /// What cooldowns are keyed by.
    pub cooldown_scope: CooldownScope,
}

/// Everything a chart shows besides its bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartConfig {
    /// Active instances, in display order.
    pub indicators: Vec<IndicatorInstance>,
    /// External trade markers.
    pub trade_markers: Vec<TradeMarker>,
    /// Layout.
    pub layout: LayoutConfig,
    /// Alerts.
    pub alerts: AlertConfig,
}

impl ChartConfig {
    /// Creates the default configuration: no indicators, no markers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instance.
    #[must_use]
    pub fn with_indicator(mut self, instance: IndicatorInstance) -> Self {
        self.indicators.push(instance);
        self
    }

    /// Appends trade markers.
    #[must_use]
    pub fn with_trade_markers<I: IntoIterator<Item = TradeMarker>>(mut self, markers: I) -> Self {
        self.trade_markers.extend(markers);
        self
    }

    /// Sets the cooldown scope.
    #[must_use]
    pub const fn with_cooldown_scope(mut self, scope: CooldownScope) -> Self {
        self.alerts.cooldown_scope = scope;
        self
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed JSON or mistyped fields.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::markers::TradeMarkerKind;
    use crate::plan::params::Params;

    #[test]
    fn test_empty_document() {
        let config = ChartConfig::from_json("{}").unwrap();
        assert_eq!(config, ChartConfig::default());
        assert_eq!(config.alerts.cooldown_scope, CooldownScope::Definition);
        assert_eq!(config.layout.panes, PaneLayout::default());
    }

    #[test]
    fn test_round_trip_with_markers() {
        let config = ChartConfig::new()
            .with_indicator(IndicatorInstance::with_id("sma", "s1", Params::new().with("period", 10)))
            .with_trade_markers([TradeMarker::new(TradeMarkerKind::Signal, 5, 1.5)])
            .with_cooldown_scope(CooldownScope::Instance);
        let json = config.to_json().unwrap();
        assert!(json.contains(r#""type":"signal""#));
        assert_eq!(ChartConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_scope_rejected() {
        assert!(ChartConfig::from_json(r#"{"alerts":{"cooldownScope":"global"}}"#).is_err());
    }
}
