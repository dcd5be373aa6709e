//! Signal - the leaf capability contract
//!
//! A [`Signal`] exposes one value plus its metadata and configuration
//! snapshot. Devices only ever call these operations and aggregate their
//! already-resolved results; how a leaf talks to hardware is its own concern.

use crate::value::{Descriptor, DescriptorMap, Kwargs, Reading, ReadingMap, Value};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use ulid::Ulid;

/// Key suffix used by configuration snapshots
pub const CONF_SUFFIX: &str = "_conf";

/// Configuration key for a signal name
#[inline]
#[must_use]
pub fn conf_key(name: &str) -> String {
    format!("{name}{CONF_SUFFIX}")
}

/// Unique identity of a node instance
///
/// Names are unique within a tree; ids are unique across trees and are what
/// parent back-references compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Ulid);

impl InstanceId {
    /// Generate new instance id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for InstanceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning back-reference from a child to the device that owns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    id: InstanceId,
    name: String,
}

impl ParentRef {
    /// Create a back-reference
    #[inline]
    #[must_use]
    pub fn new(id: InstanceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Owner's instance id
    #[inline]
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Owner's name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Arguments a device hands to a child signal's constructor
#[derive(Debug, Clone)]
pub struct SignalArgs<'a> {
    /// Resolved identifying suffix (e.g. a full channel name)
    pub suffix: String,

    /// Fully-qualified name (`<parent>_<attr>`)
    pub name: String,

    /// Owning device
    pub parent: Option<ParentRef>,

    /// Extra keyword arguments declared on the component
    pub kwargs: &'a Kwargs,
}

impl<'a> SignalArgs<'a> {
    /// Look up a keyword argument
    #[inline]
    #[must_use]
    pub fn kwarg(&self, key: &str) -> Option<&'a Value> {
        self.kwargs.get(key)
    }
}

/// Errors raised by leaf signals
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalError {
    /// Signal does not accept writes
    #[error("signal '{name}' is read-only")]
    ReadOnly { name: String },

    /// Underlying channel cannot be reached
    #[error("signal '{name}' unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    /// Value rejected by the signal
    #[error("signal '{name}' rejected value: {reason}")]
    InvalidValue { name: String, reason: String },

    /// Constructor rejected its arguments
    #[error("cannot construct signal '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    /// Staging or unstaging failed
    #[error("signal '{name}' failed to {action}: {reason}")]
    Lifecycle {
        name: String,
        action: &'static str,
        reason: String,
    },
}

impl SignalError {
    /// Name of the signal that raised the error
    #[must_use]
    pub fn signal_name(&self) -> &str {
        match self {
            Self::ReadOnly { name }
            | Self::Unavailable { name, .. }
            | Self::InvalidValue { name, .. }
            | Self::InvalidArguments { name, .. }
            | Self::Lifecycle { name, .. } => name,
        }
    }
}

/// Leaf capability contract
///
/// Only [`Signal::name`], [`Signal::get`] and [`Signal::describe`] are
/// required. The remaining operations have the conventional defaults:
/// `read` wraps `get`, configuration snapshots re-key the plain ones under
/// `<name>_conf`, and staging does nothing.
pub trait Signal: Debug {
    /// Fully-qualified name
    fn name(&self) -> &str;

    /// Owning device, `None` for a free-standing signal
    fn parent(&self) -> Option<&ParentRef> {
        None
    }

    /// Current value
    ///
    /// # Errors
    /// Returns error if the value cannot be obtained
    fn get(&self) -> Result<Value, SignalError>;

    /// Write a new value
    ///
    /// # Errors
    /// Read-only by default
    fn put(&mut self, _value: Value) -> Result<(), SignalError> {
        Err(SignalError::ReadOnly {
            name: self.name().to_string(),
        })
    }

    /// Reading keyed by name
    ///
    /// # Errors
    /// Propagates [`Signal::get`] failures
    fn read(&self) -> Result<ReadingMap, SignalError> {
        let mut out = ReadingMap::new();
        out.insert(self.name().to_string(), Reading::new(self.get()?));
        Ok(out)
    }

    /// Value metadata keyed by name; each entry carries a `source`
    ///
    /// # Errors
    /// Returns error if metadata cannot be obtained
    fn describe(&self) -> Result<DescriptorMap, SignalError>;

    /// Configuration snapshot keyed by `<name>_conf`
    ///
    /// # Errors
    /// Propagates [`Signal::get`] failures
    fn read_configuration(&self) -> Result<ReadingMap, SignalError> {
        let mut out = ReadingMap::new();
        out.insert(conf_key(self.name()), Reading::new(self.get()?));
        Ok(out)
    }

    /// Configuration metadata keyed by `<name>_conf`
    ///
    /// # Errors
    /// Propagates [`Signal::describe`] failures
    fn describe_configuration(&self) -> Result<DescriptorMap, SignalError> {
        Ok(self
            .describe()?
            .into_iter()
            .map(|(key, desc)| (conf_key(&key), desc))
            .collect())
    }

    /// Acquire whatever the leaf holds while staged
    ///
    /// # Errors
    /// Returns error if acquisition fails
    fn stage(&mut self) -> Result<(), SignalError> {
        Ok(())
    }

    /// Release staged resources; must tolerate being called while unstaged
    ///
    /// # Errors
    /// Returns error if release fails
    fn unstage(&mut self) -> Result<(), SignalError> {
        Ok(())
    }
}

/// A signal type a component can construct
///
/// # Example
/// ```
/// use devtree_signal::{Descriptor, DescriptorMap, Signal, SignalArgs, SignalError, SignalType, Value};
///
/// #[derive(Debug)]
/// struct Channel {
///     pv: String,
///     name: String,
/// }
///
/// impl Signal for Channel {
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn get(&self) -> Result<Value, SignalError> {
///         Ok(Value::from(0))
///     }
///
///     fn describe(&self) -> Result<DescriptorMap, SignalError> {
///         let mut out = DescriptorMap::new();
///         out.insert(self.name.clone(), Descriptor::new(format!("PV:{}", self.pv)));
///         Ok(out)
///     }
/// }
///
/// impl SignalType for Channel {
///     fn construct(args: SignalArgs<'_>) -> Result<Self, SignalError> {
///         Ok(Self { pv: args.suffix, name: args.name })
///     }
/// }
/// ```
pub trait SignalType: Signal + Sized + 'static {
    /// Build from the arguments a device hands over
    ///
    /// # Errors
    /// Returns error if the arguments are unacceptable
    fn construct(args: SignalArgs<'_>) -> Result<Self, SignalError>;
}
