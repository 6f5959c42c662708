//! Parameter schemas and resolved parameter sets.
//!
//! Every indicator definition declares a [`ParamSchema`]. An instance only
//! carries the values it overrides; [`ParamSchema::resolve`] merges those
//! overrides over the schema defaults and validates them, producing the
//! [`Params`] a formula actually sees.
//!
//! # Example
//!
//! ```
//! use mochart::plan::params::{ParamSchema, ParamSpec, Params};
//!
//! let schema = ParamSchema::new()
//!     .with("period", ParamSpec::number("Period", 20.0).range(2.0, 200.0));
//!
//! let resolved = schema.resolve(&Params::new().with("period", 5)).unwrap();
//! assert_eq!(resolved.period("period").unwrap(), 5);
//!
//! assert!(schema.resolve(&Params::new().with("period", 1)).is_err());
//! ```

use std::collections::BTreeMap;

use num_traits::NumCast;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric value; periods are numbers with no fractional part.
    Number(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free text or a `select` option.
    Text(String),
}

impl ParamValue {
    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "string",
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Number(v.into())
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Number(v.into())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// The declared type of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamKind {
    /// A number, optionally bounded.
    Number,
    /// Free text.
    String,
    /// A flag.
    Boolean,
    /// One of a fixed set of strings.
    Select {
        /// Allowed values.
        options: Vec<String>,
    },
}

/// Schema entry for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Declared type.
    #[serde(flatten)]
    pub kind: ParamKind,
    /// Value used when an instance does not override it.
    pub default: ParamValue,
    /// Human readable label.
    pub label: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// UI step hint for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl ParamSpec {
    /// A numeric parameter with the given default.
    #[must_use]
    pub fn number(label: impl Into<String>, default: f64) -> Self {
        Self {
            kind: ParamKind::Number,
            default: ParamValue::Number(default),
            label: label.into(),
            description: None,
            min: None,
            max: None,
            step: None,
        }
    }

    /// A boolean parameter.
    #[must_use]
    pub fn boolean(label: impl Into<String>, default: bool) -> Self {
        Self {
            kind: ParamKind::Boolean,
            default: ParamValue::Bool(default),
            ..Self::number(label, 0.0)
        }
    }

    /// A select parameter; `default` should be one of `options`.
    #[must_use]
    pub fn select<I, S>(label: impl Into<String>, default: &str, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: ParamKind::Select {
                options: options.into_iter().map(Into::into).collect(),
            },
            default: ParamValue::Text(default.to_owned()),
            ..Self::number(label, 0.0)
        }
    }

    /// Sets inclusive numeric bounds.
    #[must_use]
    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets the UI step hint.
    #[must_use]
    pub const fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn validate(&self, name: &str, value: &ParamValue) -> Result<()> {
        match (&self.kind, value) {
            (ParamKind::Number, ParamValue::Number(v)) => {
                if !v.is_finite() {
                    return Err(Error::invalid_param(name, "must be finite"));
                }
                if let Some(min) = self.min {
                    if *v < min {
                        return Err(Error::invalid_param(
                            name,
                            format!("{v} is below the minimum {min}"),
                        ));
                    }
                }
                if let Some(max) = self.max {
                    if *v > max {
                        return Err(Error::invalid_param(
                            name,
                            format!("{v} is above the maximum {max}"),
                        ));
                    }
                }
                Ok(())
            }
            (ParamKind::Boolean, ParamValue::Bool(_)) | (ParamKind::String, ParamValue::Text(_)) => {
                Ok(())
            }
            (ParamKind::Select { options }, ParamValue::Text(v)) => {
                if options.iter().any(|o| o == v) {
                    Ok(())
                } else {
                    Err(Error::invalid_param(name, format!("`{v}` is not an option")))
                }
            }
            (kind, other) => Err(Error::invalid_param(
                name,
                format!("expected {kind:?}, got {}", other.type_name()),
            )),
        }
    }
}

/// Ordered set of parameter declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSchema {
    entries: Vec<(String, ParamSpec)>,
}

impl ParamSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter declaration.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.entries.push((name.into(), spec));
        self
    }

    /// Returns the declaration for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.entries
            .iter()
            .find_map(|(k, spec)| (k == name).then_some(spec))
    }

    /// Iterates over declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the default value of every declared parameter.
    #[must_use]
    pub fn defaults(&self) -> Params {
        self.entries
            .iter()
            .map(|(k, spec)| (k.clone(), spec.default.clone()))
            .collect()
    }

    /// Merges `overrides` over the defaults and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] if an override names a parameter
    /// the schema does not declare, has the wrong type, is not finite, or
    /// falls outside the declared bounds.
    pub fn resolve(&self, overrides: &Params) -> Result<Params> {
        let mut resolved = self.defaults();
        for (name, value) in overrides.iter() {
            let spec = self
                .get(name)
                .ok_or_else(|| Error::invalid_param(name, "unknown parameter"))?;
            spec.validate(name, value)?;
            resolved.set(name, value.clone());
        }
        Ok(resolved)
    }
}

/// A set of named parameter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` and returns `self`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the raw value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if no values are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlays `other` on top of `self`.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Returns the numeric value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] if the value is missing or not a
    /// finite number.
    pub fn number(&self, name: &str) -> Result<f64> {
        match self.values.get(name) {
            Some(ParamValue::Number(v)) if v.is_finite() => Ok(*v),
            Some(ParamValue::Number(_)) => Err(Error::invalid_param(name, "must be finite")),
            Some(other) => Err(Error::invalid_param(
                name,
                format!("expected number, got {}", other.type_name()),
            )),
            None => Err(Error::invalid_param(name, "missing")),
        }
    }

    /// Returns `name` as a window length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] unless the value is a whole number
    /// of at least 1.
    pub fn period(&self, name: &str) -> Result<usize> {
        let v = self.number(name)?;
        if v.fract() != 0.0 {
            return Err(Error::invalid_param(name, format!("{v} is not a whole number")));
        }
        if v < 1.0 {
            return Err(Error::invalid_param(name, "must be at least 1"));
        }
        <usize as NumCast>::from(v)
            .ok_or_else(|| Error::invalid_param(name, format!("{v} does not fit a window length")))
    }

    /// Returns the numeric value of `name`, or `default` when it is missing
    /// or unusable.
    #[must_use]
    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.number(name).unwrap_or(default)
    }

    /// Returns `name` as a window length, or `default` when it is missing
    /// or unusable.
    #[must_use]
    pub fn period_or(&self, name: &str, default: usize) -> usize {
        self.period(name).unwrap_or(default)
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn schema() -> ParamSchema {
        ParamSchema::new()
            .with("period", ParamSpec::number("Period", 20.0).range(2.0, 200.0))
            .with(
                "stdDev",
                ParamSpec::number("Std Dev", 2.0).range(0.5, 4.0).step(0.1),
            )
            .with("source", ParamSpec::select("Source", "close", ["close", "hl2"]))
    }

    #[test]
    fn test_defaults_applied() {
        let params = schema().resolve(&Params::new()).unwrap();
        assert_eq!(params.period("period").unwrap(), 20);
        assert!((params.number("stdDev").unwrap() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_override_wins() {
        let params = schema()
            .resolve(&Params::new().with("period", 5).with("stdDev", 1.5))
            .unwrap();
        assert_eq!(params.period("period").unwrap(), 5);
        assert!((params.number("stdDev").unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let err = schema()
            .resolve(&Params::new().with("period", 500))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(err.to_string().contains("period"));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let err = schema()
            .resolve(&Params::new().with("period", "twenty"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(schema()
            .resolve(&Params::new().with("stdDev", f64::NAN))
            .is_err());
    }

    #[test]
    fn test_select_option_checked() {
        assert!(schema()
            .resolve(&Params::new().with("source", "hl2"))
            .is_ok());
        assert!(schema()
            .resolve(&Params::new().with("source", "open"))
            .is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = schema()
            .resolve(&Params::new().with("period", 10).with("fast", 3))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert!(err.to_string().contains("fast"));
        assert!(ParamSchema::new().resolve(&Params::new().with("period", 3)).is_err());
    }

    #[test]
    fn test_integer_values_convert() {
        assert_eq!(ParamValue::from(-3_i32), ParamValue::Number(-3.0));
        assert_eq!(ParamValue::from(7_u32), ParamValue::Number(7.0));
    }

    #[test]
    fn test_period_requires_whole_number() {
        let params = Params::new().with("period", 2.5).with("zero", 0);
        assert!(params.period("period").is_err());
        assert!(params.period("zero").is_err());
        assert!(params.period("missing").is_err());
        assert_eq!(params.period_or("period", 14), 14);
    }

    #[test]
    fn test_params_from_json() {
        let params: Params = serde_json::from_str(r#"{"period": 10, "flag": true}"#).unwrap();
        assert_eq!(params.period("period").unwrap(), 10);
        assert_eq!(params.get("flag"), Some(&ParamValue::Bool(true)));
    }
}
