//! Component descriptors
//!
//! A [`Component`] is a type-level declaration binding an attribute name to a
//! child type and the arguments used to construct it. Descriptors are
//! immutable and shared by every instance of the declaring device type.

use crate::device_type::DeviceType;
use crate::template::{Owner, Template, TemplateError};
use devtree_signal::{Kwargs, Signal, SignalArgs, SignalError, SignalType, Value};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Type-erased signal constructor
pub type SignalFactory =
    Arc<dyn Fn(SignalArgs<'_>) -> Result<Box<dyn Signal>, SignalError> + Send + Sync>;

/// What a component constructs
#[derive(Clone)]
pub enum ComponentKind {
    /// A leaf signal
    Signal {
        /// Rust type name of the signal, for diagnostics
        type_name: &'static str,
        /// Constructor
        factory: SignalFactory,
    },

    /// A nested device
    Device(Arc<DeviceType>),
}

impl ComponentKind {
    /// Name of the child type
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Signal { type_name, .. } => type_name,
            Self::Device(device_type) => device_type.name(),
        }
    }
}

impl Debug for ComponentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal { type_name, .. } => f.debug_tuple("Signal").field(type_name).finish(),
            Self::Device(device_type) => f.debug_tuple("Device").field(&device_type.name()).finish(),
        }
    }
}

/// Identifying suffix of a child
///
/// A literal suffix is appended to the owner's prefix; a formatted one
/// produces the whole string from the owner.
#[derive(Debug, Clone)]
pub enum Suffix {
    /// Appended to the owner's prefix
    Literal(String),

    /// Evaluated against the owner at first access
    Formatted(Template),
}

impl Suffix {
    /// Resolve against the owner's current state
    ///
    /// # Errors
    /// Propagates template resolution failures
    pub fn resolve(&self, owner: &dyn Owner) -> Result<String, TemplateError> {
        match self {
            Self::Literal(suffix) => Ok(format!("{}{}", owner.prefix(), suffix)),
            Self::Formatted(template) => template.resolve(owner),
        }
    }

    /// Template, if formatted
    #[inline]
    #[must_use]
    pub fn template(&self) -> Option<&Template> {
        match self {
            Self::Formatted(t) => Some(t),
            Self::Literal(_) => None,
        }
    }
}

impl From<&str> for Suffix {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Suffix {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<Template> for Suffix {
    fn from(t: Template) -> Self {
        Self::Formatted(t)
    }
}

/// Declaration of a child component
///
/// By default a component is part of its owner's read set and not of its
/// configuration set.
///
/// # Example
/// ```
/// use devtree_component::{Component, Template};
/// use devtree_signal::SoftSignal;
///
/// let readback = Component::signal::<SoftSignal>("RBV");
/// let channel = Component::signal::<SoftSignal>(Template::new("{prefix}{ch}"))
///     .with_read_default(false)
///     .with_config_default(true)
///     .with_kwarg("value", 0);
///
/// assert!(readback.is_read_default());
/// assert!(channel.is_config_default());
/// ```
#[derive(Debug, Clone)]
pub struct Component {
    kind: ComponentKind,
    suffix: Suffix,
    kwargs: Kwargs,
    read_default: bool,
    config_default: bool,
    doc: Option<String>,
}

impl Component {
    /// Component constructing a leaf of type `T`
    #[must_use]
    pub fn signal<T: SignalType>(suffix: impl Into<Suffix>) -> Self {
        let factory: SignalFactory = Arc::new(|args: SignalArgs<'_>| {
            T::construct(args).map(|sig| Box::new(sig) as Box<dyn Signal>)
        });
        Self::with_kind(
            ComponentKind::Signal {
                type_name: std::any::type_name::<T>(),
                factory,
            },
            suffix.into(),
        )
    }

    /// Component constructing a leaf through an arbitrary factory
    #[must_use]
    pub fn from_factory(
        type_name: &'static str,
        factory: SignalFactory,
        suffix: impl Into<Suffix>,
    ) -> Self {
        Self::with_kind(ComponentKind::Signal { type_name, factory }, suffix.into())
    }

    /// Component constructing a sub-device
    #[must_use]
    pub fn device(device_type: &Arc<DeviceType>, suffix: impl Into<Suffix>) -> Self {
        Self::with_kind(ComponentKind::Device(Arc::clone(device_type)), suffix.into())
    }

    fn with_kind(kind: ComponentKind, suffix: Suffix) -> Self {
        Self {
            kind,
            suffix,
            kwargs: Kwargs::new(),
            read_default: true,
            config_default: false,
            doc: None,
        }
    }

    /// Add a construction keyword argument
    #[inline]
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Whether the component starts in its owner's read set
    #[inline]
    #[must_use]
    pub fn with_read_default(mut self, flag: bool) -> Self {
        self.read_default = flag;
        self
    }

    /// Whether the component starts in its owner's configuration set
    #[inline]
    #[must_use]
    pub fn with_config_default(mut self, flag: bool) -> Self {
        self.config_default = flag;
        self
    }

    /// Attach documentation
    #[inline]
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Child kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Sub-device type, if this component is a device
    #[inline]
    #[must_use]
    pub fn device_type(&self) -> Option<&Arc<DeviceType>> {
        match &self.kind {
            ComponentKind::Device(device_type) => Some(device_type),
            ComponentKind::Signal { .. } => None,
        }
    }

    /// Check if this component is a sub-device
    #[inline]
    #[must_use]
    pub fn is_device(&self) -> bool {
        matches!(self.kind, ComponentKind::Device(_))
    }

    /// Declared suffix
    #[inline]
    #[must_use]
    pub fn suffix(&self) -> &Suffix {
        &self.suffix
    }

    /// Construction keyword arguments
    #[inline]
    #[must_use]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// Default read-set membership
    #[inline]
    #[must_use]
    pub fn is_read_default(&self) -> bool {
        self.read_default
    }

    /// Default configuration-set membership
    #[inline]
    #[must_use]
    pub fn is_config_default(&self) -> bool {
        self.config_default
    }

    /// Documentation
    #[inline]
    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}
