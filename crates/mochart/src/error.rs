//! Error types for mochart.
//!
//! Every fallible operation in the crate returns [`Result`]. Failures are
//! always recovered locally: the scheduler records them per instance and
//! excludes the instance from ranges, geometry and alerts.

use thiserror::Error;

/// The main error type for mochart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The bar series is too short for the requested operation.
    #[error("insufficient data: required {required} bars, got {actual}")]
    InsufficientData {
        /// The number of bars required.
        required: usize,
        /// The number of bars provided.
        actual: usize,
    },

    /// A parameter value is missing, out of bounds, or of the wrong type.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParams {
        /// Name of the offending parameter.
        name: String,
        /// Description of why the value was rejected.
        reason: String,
    },

    /// The accelerated backend failed or returned a malformed buffer.
    #[error("accelerated path failed: {message}")]
    AcceleratedPath {
        /// Backend-provided failure description.
        message: String,
    },

    /// An indicator formula failed while computing.
    #[error("computation failed: {message}")]
    Computation {
        /// Description of the failure, including a caught panic payload.
        message: String,
    },

    /// A definition id is not registered.
    #[error("indicator not found: {id}")]
    IndicatorNotFound {
        /// The unknown definition id.
        id: String,
    },

    /// The dependency relation contains a cycle.
    #[error("circular dependency detected for indicator: {id}")]
    CircularDependency {
        /// A definition id that participates in the cycle.
        id: String,
    },
}

/// Coarse classification of an [`Error`], useful for matching without
/// destructuring payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::InsufficientData`].
    InsufficientData,
    /// See [`Error::InvalidParams`].
    InvalidParams,
    /// See [`Error::AcceleratedPath`].
    AcceleratedPath,
    /// See [`Error::Computation`].
    Computation,
    /// See [`Error::IndicatorNotFound`].
    IndicatorNotFound,
    /// See [`Error::CircularDependency`].
    CircularDependency,
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::InvalidParams { .. } => ErrorKind::InvalidParams,
            Self::AcceleratedPath { .. } => ErrorKind::AcceleratedPath,
            Self::Computation { .. } => ErrorKind::Computation,
            Self::IndicatorNotFound { .. } => ErrorKind::IndicatorNotFound,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
        }
    }

    pub(crate) fn invalid_param(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn accelerated(message: impl Into<String>) -> Self {
        Self::AcceleratedPath {
            message: message.into(),
        }
    }

    pub(crate) fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using the mochart Error type.
pub type Result<T> = std::result::Result<T, Error>;
