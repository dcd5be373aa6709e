//! Device instances
//!
//! A [`Device`] is one node of a tree built from a registered
//! [`DeviceType`]. Children are constructed on first access, exactly once,
//! and keep their identity afterwards. A child is named
//! `<parent name><separator><attr>` and holds a [`ParentRef`] back to the
//! device that owns it.

use crate::attrs::AttrSet;
use crate::config::DeviceConfig;
use crate::error::{ConstructionError, DeviceError, ValidationError};
use crate::lifecycle::StageState;
use devtree_component::{AttrPath, Component, ComponentKind, DeviceType, Owner};
use devtree_signal::{InstanceId, Kwargs, ParentRef, Signal, SignalArgs, Value};
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use std::sync::Arc;

/// A constructed child
#[derive(Debug)]
pub enum Child {
    /// Leaf
    Signal(Box<dyn Signal>),
    /// Nested device
    Device(Box<Device>),
}

impl Child {
    /// Fully-qualified name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Signal(signal) => signal.name(),
            Self::Device(device) => device.name(),
        }
    }

    /// Owning device
    #[must_use]
    pub fn parent(&self) -> Option<&ParentRef> {
        match self {
            Self::Signal(signal) => signal.parent(),
            Self::Device(device) => device.parent(),
        }
    }

    /// Leaf, if this child is a signal
    #[must_use]
    pub fn as_signal(&self) -> Option<&dyn Signal> {
        match self {
            Self::Signal(signal) => Some(signal.as_ref()),
            Self::Device(_) => None,
        }
    }

    /// Nested device, if this child is one
    #[must_use]
    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Self::Device(device) => Some(device.as_ref()),
            Self::Signal(_) => None,
        }
    }

    /// Check if this child is a device
    #[inline]
    #[must_use]
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

/// A device instance
///
/// # Example
/// ```
/// use devtree_component::{Component, DeviceType};
/// use devtree_device::Device;
/// use devtree_signal::SoftSignal;
///
/// let motor = DeviceType::builder("Motor")
///     .component("user_readback", Component::signal::<SoftSignal>("RBV").with_kwarg("value", 0.0))
///     .component("velocity", Component::signal::<SoftSignal>("VELO").with_config_default(true))
///     .build()
///     .unwrap();
///
/// let m1 = Device::builder(&motor, "XF:31ID{Mtr:1}").name("m1").build().unwrap();
/// assert_eq!(m1.signal("velocity").unwrap().name(), "m1_velocity");
/// assert_eq!(m1.read().unwrap().keys().collect::<Vec<_>>(), vec!["m1_user_readback", "m1_velocity"]);
/// ```
#[derive(Debug)]
pub struct Device {
    pub(crate) id: InstanceId,
    pub(crate) device_type: Arc<DeviceType>,
    pub(crate) prefix: String,
    pub(crate) name: String,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) fields: IndexMap<String, Value>,
    pub(crate) read_attrs: Vec<String>,
    pub(crate) configuration_attrs: Vec<String>,
    pub(crate) monitor_attrs: Vec<String>,
    pub(crate) children: Vec<OnceCell<Child>>,
    pub(crate) state: StageState,
    pub(crate) stage_originals: Vec<(String, Value)>,
    pub(crate) config: Arc<DeviceConfig>,
}

impl Device {
    /// Start building an instance of `device_type`
    #[inline]
    pub fn builder(device_type: &Arc<DeviceType>, prefix: impl Into<String>) -> DeviceBuilder {
        DeviceBuilder::new(device_type, prefix)
    }

    /// Instance id
    #[inline]
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Fully-qualified name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifying prefix
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Owning device, `None` at the root
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Back-reference handed to this device's children
    #[must_use]
    pub fn as_parent(&self) -> ParentRef {
        ParentRef::new(self.id, self.name.clone())
    }

    /// Registered type
    #[inline]
    #[must_use]
    pub fn device_type(&self) -> &Arc<DeviceType> {
        &self.device_type
    }

    /// Tree configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Component roster in declaration order
    pub fn signal_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.device_type.signal_names()
    }

    /// Instance field
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All instance fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Change an instance field, returning the previous value
    ///
    /// Children constructed later observe the new value.
    ///
    /// # Errors
    /// Returns error if the type declares no such field
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) -> Result<Value, DeviceError> {
        match self.fields.get_mut(key) {
            Some(slot) => Ok(std::mem::replace(slot, value.into())),
            None => Err(ConstructionError::UnknownField {
                type_name: self.device_type.name().to_string(),
                field: key.to_string(),
            }
            .into()),
        }
    }

    /// Check if a child has been constructed
    #[must_use]
    pub fn is_constructed(&self, attr: &str) -> bool {
        self.device_type
            .index_of(attr)
            .and_then(|index| self.children.get(index))
            .is_some_and(|cell| cell.get().is_some())
    }

    /// Children constructed so far, in roster order
    pub fn constructed(&self) -> impl Iterator<Item = (&str, &Child)> + '_ {
        self.device_type
            .signal_names()
            .zip(&self.children)
            .filter_map(|(attr, cell)| cell.get().map(|child| (attr, child)))
    }

    fn entry(&self, attr: &str) -> Result<(usize, &Component), ValidationError> {
        self.device_type
            .entry(attr)
            .ok_or_else(|| unknown(&self.name, attr))
    }

    /// Child by attribute name, constructing it on first access
    ///
    /// # Errors
    /// Returns error if the attribute is unknown or construction fails
    pub fn child(&self, attr: &str) -> Result<&Child, DeviceError> {
        let (index, component) = self.entry(attr)?;
        let child = self.children[index].get_or_try_init(|| self.construct(attr, component))?;
        Ok(child)
    }

    /// Mutable child by attribute name, constructing it on first access
    ///
    /// # Errors
    /// Returns error if the attribute is unknown or construction fails
    pub fn child_mut(&mut self, attr: &str) -> Result<&mut Child, DeviceError> {
        self.slot_mut(attr).map(|(_, child)| child)
    }

    /// Owner name alongside the mutable child, as disjoint borrows
    fn slot_mut(&mut self, attr: &str) -> Result<(&str, &mut Child), DeviceError> {
        let (index, _) = self.entry(attr)?;
        self.child(attr)?;
        let Self { name, children, .. } = self;
        match children[index].get_mut() {
            Some(child) => Ok((name.as_str(), child)),
            None => Err(unknown(name, attr).into()),
        }
    }

    /// Signal child
    ///
    /// # Errors
    /// Returns error if the attribute is unknown, a device, or fails to construct
    pub fn signal(&self, attr: &str) -> Result<&dyn Signal, DeviceError> {
        match self.child(attr)? {
            Child::Signal(signal) => Ok(signal.as_ref()),
            Child::Device(_) => Err(ValidationError::NotASignal {
                device: self.name.clone(),
                attr: attr.to_string(),
            }
            .into()),
        }
    }

    /// Mutable signal child
    ///
    /// # Errors
    /// Returns error if the attribute is unknown, a device, or fails to construct
    pub fn signal_mut(&mut self, attr: &str) -> Result<&mut dyn Signal, DeviceError> {
        match self.slot_mut(attr)? {
            (_, Child::Signal(signal)) => Ok(signal.as_mut()),
            (name, Child::Device(_)) => Err(ValidationError::NotASignal {
                device: name.to_string(),
                attr: attr.to_string(),
            }
            .into()),
        }
    }

    /// Sub-device child
    ///
    /// # Errors
    /// Returns error if the attribute is unknown, a signal, or fails to construct
    pub fn device(&self, attr: &str) -> Result<&Device, DeviceError> {
        match self.child(attr)? {
            Child::Device(device) => Ok(device.as_ref()),
            Child::Signal(_) => Err(not_a_device(&self.name, attr).into()),
        }
    }

    /// Mutable sub-device child
    ///
    /// # Errors
    /// Returns error if the attribute is unknown, a signal, or fails to construct
    pub fn device_mut(&mut self, attr: &str) -> Result<&mut Device, DeviceError> {
        match self.slot_mut(attr)? {
            (_, Child::Device(device)) => Ok(device.as_mut()),
            (name, Child::Signal(_)) => Err(not_a_device(name, attr).into()),
        }
    }

    /// Resolve a dotted path (`sub_cpt2.cpt2`) to a child
    ///
    /// # Errors
    /// Returns error if the path is malformed, a segment is unknown, or the
    /// path continues through a signal
    pub fn lookup(&self, path: &str) -> Result<&Child, DeviceError> {
        let path: AttrPath = path.parse().map_err(ValidationError::from)?;
        self.resolve(&path)
    }

    pub(crate) fn resolve(&self, path: &AttrPath) -> Result<&Child, DeviceError> {
        let child = self.child(path.head())?;
        match (path.rest(), child) {
            (None, child) => Ok(child),
            (Some(rest), Child::Device(device)) => device.resolve(&rest),
            (Some(_), Child::Signal(_)) => Err(not_a_device(&self.name, path.head()).into()),
        }
    }

    /// Current value of every component, sub-devices nested
    ///
    /// # Errors
    /// Propagates construction and leaf failures
    pub fn get(&self) -> Result<Value, DeviceError> {
        let mut out = serde_json::Map::new();
        for attr in self.device_type.signal_names() {
            let value = match self.child(attr)? {
                Child::Signal(signal) => signal.get()?,
                Child::Device(device) => device.get()?,
            };
            out.insert(attr.to_string(), value);
        }
        Ok(Value::Object(out))
    }

    /// Every leaf of the tree with its dotted path, in roster order
    ///
    /// Constructs every child along the way.
    ///
    /// # Errors
    /// Propagates construction failures
    pub fn walk_signals(&self) -> Result<Vec<(AttrPath, &dyn Signal)>, DeviceError> {
        let mut out = Vec::new();
        for attr in self.device_type.signal_names() {
            match self.child(attr)? {
                Child::Signal(signal) => {
                    let path = AttrPath::single(attr).map_err(ValidationError::from)?;
                    out.push((path, signal.as_ref()));
                }
                Child::Device(device) => {
                    for (path, signal) in device.walk_signals()? {
                        out.push((path.under(attr).map_err(ValidationError::from)?, signal));
                    }
                }
            }
        }
        Ok(out)
    }

    fn construct(&self, attr: &str, component: &Component) -> Result<Child, ConstructionError> {
        let suffix = component
            .suffix()
            .resolve(self)
            .map_err(|source| ConstructionError::Template {
                device: self.name.clone(),
                attr: attr.to_string(),
                source,
            })?;
        let name = format!("{}{}{}", self.name, self.config.name_separator, attr);

        let child = match component.kind() {
            ComponentKind::Signal { factory, .. } => {
                let signal = factory(SignalArgs {
                    suffix,
                    name,
                    parent: Some(self.as_parent()),
                    kwargs: component.kwargs(),
                })
                .map_err(|source| ConstructionError::Signal {
                    device: self.name.clone(),
                    attr: attr.to_string(),
                    source,
                })?;
                Child::Signal(signal)
            }
            ComponentKind::Device(device_type) => {
                let device = DeviceBuilder::new(device_type, suffix)
                    .name(name)
                    .parent(self.as_parent())
                    .fields(component.kwargs())
                    .shared_config(Arc::clone(&self.config))
                    .assemble()?;
                Child::Device(Box::new(device))
            }
        };

        tracing::debug!(
            device = %self.name,
            attr,
            child = %child.name(),
            kind = component.kind().type_name(),
            "constructed child"
        );
        Ok(child)
    }
}

impl Owner for Device {
    fn type_name(&self) -> &str {
        self.device_type.name()
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

fn unknown(device: &str, attr: &str) -> ValidationError {
    ValidationError::UnknownAttribute {
        device: device.to_string(),
        attr: attr.to_string(),
    }
}

fn not_a_device(device: &str, attr: &str) -> ValidationError {
    ValidationError::NotADevice {
        device: device.to_string(),
        attr: attr.to_string(),
    }
}

/// Builder for [`Device`]
#[derive(Debug)]
#[must_use]
pub struct DeviceBuilder {
    device_type: Arc<DeviceType>,
    prefix: String,
    name: Option<String>,
    parent: Option<ParentRef>,
    fields: Vec<(String, Value)>,
    overrides: Vec<(AttrSet, Vec<String>)>,
    config: Option<Arc<DeviceConfig>>,
}

impl DeviceBuilder {
    /// Create new builder
    pub fn new(device_type: &Arc<DeviceType>, prefix: impl Into<String>) -> Self {
        Self {
            device_type: Arc::clone(device_type),
            prefix: prefix.into(),
            name: None,
            parent: None,
            fields: Vec::new(),
            overrides: Vec::new(),
            config: None,
        }
    }

    /// With explicit name
    #[inline]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With owning device
    #[inline]
    pub fn parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// With an instance field value
    #[inline]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// With several instance field values
    pub fn fields(mut self, fields: &Kwargs) -> Self {
        self.fields
            .extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
        self
    }

    /// With an explicit read set
    pub fn read_attrs<I, S>(self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs(AttrSet::Read, attrs)
    }

    /// With an explicit configuration set
    pub fn configuration_attrs<I, S>(self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs(AttrSet::Configuration, attrs)
    }

    /// With an explicit monitor set
    pub fn monitor_attrs<I, S>(self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs(AttrSet::Monitor, attrs)
    }

    fn attrs<I, S>(mut self, set: AttrSet, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.overrides
            .push((set, attrs.into_iter().map(Into::into).collect()));
        self
    }

    /// With tree configuration
    #[inline]
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    pub(crate) fn shared_config(mut self, config: Arc<DeviceConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the instance
    ///
    /// Children are not constructed yet, except those a dotted set override
    /// reaches into.
    ///
    /// # Errors
    /// Returns error for undeclared fields, an invalid configuration or an
    /// invalid set override
    pub fn build(mut self) -> Result<Device, DeviceError> {
        if let Some(config) = &self.config {
            config.validate()?;
        }
        let overrides = std::mem::take(&mut self.overrides);
        let mut device = self.assemble()?;
        for (set, attrs) in overrides {
            device.set_attrs(set, attrs)?;
        }

        tracing::debug!(
            device = %device.name,
            device_type = %device.device_type.name(),
            prefix = %device.prefix,
            "built device"
        );
        Ok(device)
    }

    pub(crate) fn assemble(self) -> Result<Device, ConstructionError> {
        let mut fields = self.device_type.fields().clone();
        for (key, value) in self.fields {
            match fields.get_mut(&key) {
                Some(slot) => *slot = value,
                None => {
                    return Err(ConstructionError::UnknownField {
                        type_name: self.device_type.name().to_string(),
                        field: key,
                    })
                }
            }
        }

        let name = self
            .name
            .unwrap_or_else(|| derive_name(&self.prefix, self.device_type.name()));
        let children = (0..self.device_type.len()).map(|_| OnceCell::new()).collect();

        Ok(Device {
            id: InstanceId::new(),
            read_attrs: self.device_type.default_read_attrs(),
            configuration_attrs: self.device_type.default_configuration_attrs(),
            monitor_attrs: Vec::new(),
            device_type: self.device_type,
            prefix: self.prefix,
            name,
            parent: self.parent,
            fields,
            children,
            state: StageState::Unstaged,
            stage_originals: Vec::new(),
            config: self.config.unwrap_or_default(),
        })
    }
}

/// Root name from a prefix, falling back to the snake-cased type name
fn derive_name(prefix: &str, type_name: &str) -> String {
    let sanitized: String = prefix
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        snake_case(type_name)
    } else {
        trimmed.to_string()
    }
}

fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtree_component::Template;
    use devtree_signal::SoftSignal;
    use serde_json::json;

    fn sub_type() -> Arc<DeviceType> {
        DeviceType::builder("SubDevice")
            .component("cpt1", Component::signal::<SoftSignal>("1").with_kwarg("value", 1))
            .component("cpt2", Component::signal::<SoftSignal>("2").with_kwarg("value", 2))
            .build()
            .unwrap()
    }

    fn top_type() -> Arc<DeviceType> {
        DeviceType::builder("MyDevice")
            .component("sub", Component::device(&sub_type(), "SUB:"))
            .component("cpt3", Component::signal::<SoftSignal>("3").with_kwarg("value", 3))
            .build()
            .unwrap()
    }

    #[test]
    fn children_are_lazy_and_stable() {
        let dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        assert!(!dev.is_constructed("cpt3"));
        assert_eq!(dev.constructed().count(), 0);

        let first = dev.child("cpt3").unwrap() as *const Child;
        let second = dev.child("cpt3").unwrap() as *const Child;
        assert_eq!(first, second);
        assert!(dev.is_constructed("cpt3"));
        assert_eq!(dev.constructed().map(|(attr, _)| attr).collect::<Vec<_>>(), vec!["cpt3"]);
    }

    #[test]
    fn names_and_parents() {
        let dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        let sub = dev.device("sub").unwrap();
        assert_eq!(sub.name(), "dev_sub");
        assert_eq!(sub.prefix(), "XF:SUB:");
        assert_eq!(sub.parent().map(ParentRef::id), Some(dev.id()));

        let leaf = sub.signal("cpt1").unwrap();
        assert_eq!(leaf.name(), "dev_sub_cpt1");
        assert_eq!(leaf.parent().map(ParentRef::id), Some(sub.id()));
        assert_eq!(dev.parent(), None);
    }

    #[test]
    fn custom_separator_reaches_descendants() {
        let dev = Device::builder(&top_type(), "XF:")
            .name("dev")
            .config(DeviceConfig::new().with_name_separator("__"))
            .build()
            .unwrap();
        assert_eq!(dev.lookup("sub.cpt2").unwrap().name(), "dev__sub__cpt2");
    }

    #[test]
    fn accessor_kind_mismatch() {
        let mut dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        assert!(matches!(
            dev.signal("sub"),
            Err(DeviceError::Validation(ValidationError::NotASignal { .. }))
        ));
        assert!(matches!(
            dev.device_mut("cpt3"),
            Err(DeviceError::Validation(ValidationError::NotADevice { .. }))
        ));
        assert!(matches!(
            dev.child("nope"),
            Err(DeviceError::Validation(ValidationError::UnknownAttribute { .. }))
        ));
    }

    #[test]
    fn lookup_paths() {
        let dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        assert_eq!(dev.lookup("cpt3").unwrap().name(), "dev_cpt3");
        assert!(dev.lookup("sub").unwrap().is_device());
        assert!(matches!(
            dev.lookup("cpt3.x"),
            Err(DeviceError::Validation(ValidationError::NotADevice { .. }))
        ));
        assert!(matches!(
            dev.lookup("sub..cpt1"),
            Err(DeviceError::Validation(ValidationError::InvalidPath(_)))
        ));
    }

    #[test]
    fn get_nests_sub_devices() {
        let dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        assert_eq!(
            dev.get().unwrap(),
            json!({"sub": {"cpt1": 1, "cpt2": 2}, "cpt3": 3})
        );
    }

    #[test]
    fn walk_signals_lists_every_leaf() {
        let dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        let walked: Vec<(String, String)> = dev
            .walk_signals()
            .unwrap()
            .into_iter()
            .map(|(path, signal)| (path.to_string(), signal.name().to_string()))
            .collect();
        assert_eq!(
            walked,
            vec![
                ("sub.cpt1".to_string(), "dev_sub_cpt1".to_string()),
                ("sub.cpt2".to_string(), "dev_sub_cpt2".to_string()),
                ("cpt3".to_string(), "dev_cpt3".to_string()),
            ]
        );
    }

    #[test]
    fn signal_mut_writes_through() {
        let mut dev = Device::builder(&top_type(), "XF:").name("dev").build().unwrap();
        dev.device_mut("sub")
            .unwrap()
            .signal_mut("cpt2")
            .unwrap()
            .put(json!(20))
            .unwrap();
        assert_eq!(dev.lookup("sub.cpt2").unwrap().as_signal().unwrap().get().unwrap(), json!(20));
    }

    #[test]
    fn fields_feed_templates() {
        let ty = DeviceType::builder("Channel")
            .field("ch", "a")
            .component("value", Component::signal::<SoftSignal>(Template::new("{prefix}Ch:{ch}")))
            .build()
            .unwrap();

        let mut dev = Device::builder(&ty, "X:").name("chan").build().unwrap();
        assert_eq!(dev.set_field("ch", "b").unwrap(), json!("a"));

        let described = dev.signal("value").unwrap().describe().unwrap();
        assert_eq!(described["chan_value"].source, "SIM:X:Ch:b");
    }

    #[test]
    fn unknown_field_is_a_construction_error() {
        let result = Device::builder(&top_type(), "XF:").field("nope", 1).build();
        assert!(matches!(
            result,
            Err(DeviceError::Construction(ConstructionError::UnknownField { .. }))
        ));

        let mut dev = Device::builder(&top_type(), "XF:").build().unwrap();
        assert!(dev.set_field("nope", 1).is_err());
    }

    #[test]
    fn sub_device_kwargs_become_fields() {
        let channel = DeviceType::builder("Channel")
            .field("ch", "a")
            .component("value", Component::signal::<SoftSignal>(Template::new("{prefix}{ch}")))
            .build()
            .unwrap();
        let box_type = DeviceType::builder("Box")
            .component("left", Component::device(&channel, "L:").with_kwarg("ch", "x"))
            .component("right", Component::device(&channel, "R:").with_kwarg("bogus", 1))
            .build()
            .unwrap();

        let dev = Device::builder(&box_type, "B:").name("box").build().unwrap();
        assert_eq!(dev.device("left").unwrap().field("ch"), Some(&json!("x")));
        assert!(matches!(
            dev.child("right"),
            Err(DeviceError::Construction(ConstructionError::UnknownField { .. }))
        ));
        // a failed construction leaves the slot empty
        assert!(!dev.is_constructed("right"));
    }

    #[test]
    fn derived_names() {
        assert_eq!(derive_name("XF:31ID{Mtr:1}", "Motor"), "XF_31ID_Mtr_1");
        assert_eq!(derive_name("dev_", "Motor"), "dev");
        assert_eq!(derive_name("", "MyDevice"), "my_device");
        assert_eq!(derive_name(":::", "SubSubDevice"), "sub_sub_device");
    }

    #[test]
    fn invalid_config_rejected() {
        let result = Device::builder(&top_type(), "XF:")
            .config(DeviceConfig::new().with_name_separator(""))
            .build();
        assert!(matches!(result, Err(DeviceError::Config(_))));
    }
}
