//! Error types for device trees
//!
//! Provides error handling for:
//! - Child construction failures (templates, rejected arguments, fields)
//! - Attribute-set and configure validation
//! - Aggregation key collisions
//! - Staging and unstaging failures
//!
//! Leaf failures travel as [`SignalError`] unchanged.

use crate::config::ConfigError;
use devtree_component::{DefinitionError, PathError, TemplateError};
use devtree_signal::SignalError;

/// Main device error type
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Type registration failed
    #[error("definition failed: {0}")]
    Definition(#[from] DefinitionError),

    /// Instance or child construction failed
    #[error("construction failed: {0}")]
    Construction(#[from] ConstructionError),

    /// Attribute-set or option validation failed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A leaf failed
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Aggregated maps could not be merged
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),

    /// Staging lifecycle failed
    #[error("staging failed: {0}")]
    Stage(#[from] StageError),

    /// Tree configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DeviceError {
    /// Check if the error is a type-definition failure
    #[inline]
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Definition(_))
    }

    /// Check if the error rejected an assignment without changing anything
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Leaf error at the root of this failure, if any
    #[must_use]
    pub fn signal_error(&self) -> Option<&SignalError> {
        match self {
            Self::Signal(err) | Self::Construction(ConstructionError::Signal { source: err, .. }) => {
                Some(err)
            }
            Self::Stage(StageError::ChildFailed { source, .. })
            | Self::Stage(StageError::RollbackFailed { source, .. }) => source.signal_error(),
            _ => None,
        }
    }
}

/// Construction errors, raised when a device or one of its children is built
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    /// Suffix template could not be evaluated
    #[error("'{device}.{attr}': {source}")]
    Template {
        device: String,
        attr: String,
        #[source]
        source: TemplateError,
    },

    /// Child signal rejected its arguments
    #[error("'{device}.{attr}': {source}")]
    Signal {
        device: String,
        attr: String,
        #[source]
        source: SignalError,
    },

    /// Instance field not declared by the type
    #[error("'{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },
}

/// Validation errors; the rejected assignment changed nothing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Name not in the roster
    #[error("'{device}' has no component '{attr}'")]
    UnknownAttribute { device: String, attr: String },

    /// Path continues through a signal, or accessor expected a device
    #[error("'{device}.{attr}' is a signal, not a device")]
    NotADevice { device: String, attr: String },

    /// Accessor expected a signal
    #[error("'{device}.{attr}' is a device, not a signal")]
    NotASignal { device: String, attr: String },

    /// Path does not parse
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// Configure key outside the configuration set
    #[error("'{device}' cannot configure '{key}': not in configuration_attrs")]
    NotConfigurable { device: String, key: String },

    /// Option value unusable for its target
    #[error("'{device}' option '{key}': {reason}")]
    InvalidOption {
        device: String,
        key: String,
        reason: String,
    },
}

/// Aggregation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    /// Two children produced the same key
    #[error("'{device}' aggregated duplicate key '{key}'")]
    DuplicateKey { device: String, key: String },
}

/// Staging errors
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A child failed to stage
    #[error("'{device}.{attr}' failed to stage (rolled back: {rolled_back}): {source}")]
    ChildFailed {
        device: String,
        attr: String,
        rolled_back: bool,
        #[source]
        source: Box<DeviceError>,
    },

    /// A child failed to stage and the rollback failed too
    #[error("'{device}.{attr}' failed to stage and {} rollback step(s) failed: {source}", .failures.len())]
    RollbackFailed {
        device: String,
        attr: String,
        #[source]
        source: Box<DeviceError>,
        failures: Vec<DeviceError>,
    },

    /// Some children failed to unstage; the rest were released
    #[error("'{device}' failed to unstage {} part(s)", .failures.len())]
    UnstageFailed {
        device: String,
        failures: Vec<DeviceError>,
    },
}

impl StageError {
    /// Device that reported the failure
    #[must_use]
    pub fn device(&self) -> &str {
        match self {
            Self::ChildFailed { device, .. }
            | Self::RollbackFailed { device, .. }
            | Self::UnstageFailed { device, .. } => device,
        }
    }
}
