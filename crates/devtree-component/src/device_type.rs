//! Device type registration
//!
//! A [`DeviceType`] is the per-type metadata table: the ordered component
//! roster (inherited declarations first), instance field defaults and stage
//! signals. Every structural rule is enforced by
//! [`DeviceTypeBuilder::build`], so a type that builds is legal for every
//! instance.

use crate::component::{Component, ComponentKind};
use crate::path::is_identifier;
use crate::template::TemplateError;
use devtree_signal::Value;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Names no component may use
///
/// These are the structural attributes every device carries.
pub const RESERVED_NAMES: [&str; 9] = [
    "name",
    "parent",
    "signal_names",
    "_signals",
    "read_attrs",
    "configuration_attrs",
    "monitor_attrs",
    "_sig_attrs",
    "_sub_devices",
];

/// Placeholders templates resolve from the owner itself
const BUILTIN_PLACEHOLDERS: [&str; 2] = ["prefix", "name"];

/// Check if a component name is reserved
#[inline]
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Registered device type
///
/// Shared through `Arc` by every instance and every type embedding it.
#[derive(Debug)]
pub struct DeviceType {
    name: String,
    lineage: Vec<String>,
    components: IndexMap<String, Component>,
    fields: IndexMap<String, Value>,
    stage_sigs: IndexMap<String, Value>,
}

impl DeviceType {
    /// Start declaring a type
    #[inline]
    #[must_use]
    pub fn builder(name: impl Into<String>) -> DeviceTypeBuilder {
        DeviceTypeBuilder::new(name)
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ancestor type names, nearest first
    #[inline]
    #[must_use]
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Check if this type is `name` or derives from it
    #[must_use]
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.lineage.iter().any(|n| n == name)
    }

    /// Component roster in declaration order
    pub fn signal_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.keys().map(String::as_str)
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the type declares no components
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component by attribute name
    #[inline]
    #[must_use]
    pub fn component(&self, attr: &str) -> Option<&Component> {
        self.components.get(attr)
    }

    /// Roster position and component of an attribute
    #[inline]
    #[must_use]
    pub fn entry(&self, attr: &str) -> Option<(usize, &Component)> {
        self.components
            .get_full(attr)
            .map(|(index, _, cpt)| (index, cpt))
    }

    /// Roster position of an attribute
    #[inline]
    #[must_use]
    pub fn index_of(&self, attr: &str) -> Option<usize> {
        self.components.get_index_of(attr)
    }

    /// Component at a roster position
    #[inline]
    #[must_use]
    pub fn component_at(&self, index: usize) -> Option<(&str, &Component)> {
        self.components
            .get_index(index)
            .map(|(attr, cpt)| (attr.as_str(), cpt))
    }

    /// Iterate components in roster order
    pub fn components(&self) -> impl Iterator<Item = (&str, &Component)> + '_ {
        self.components.iter().map(|(attr, cpt)| (attr.as_str(), cpt))
    }

    /// Components flagged for the default read set
    #[must_use]
    pub fn default_read_attrs(&self) -> Vec<String> {
        self.components
            .iter()
            .filter(|(_, cpt)| cpt.is_read_default())
            .map(|(attr, _)| attr.clone())
            .collect()
    }

    /// Components flagged for the default configuration set
    #[must_use]
    pub fn default_configuration_attrs(&self) -> Vec<String> {
        self.components
            .iter()
            .filter(|(_, cpt)| cpt.is_config_default())
            .map(|(attr, _)| attr.clone())
            .collect()
    }

    /// Declared instance fields with their defaults
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Check if the type declares a field
    #[inline]
    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Values signals take while the device is staged
    #[inline]
    #[must_use]
    pub fn stage_sigs(&self) -> &IndexMap<String, Value> {
        &self.stage_sigs
    }
}

/// Builder for [`DeviceType`]
///
/// # Example
/// ```
/// use devtree_component::{Component, DeviceType, Template};
/// use devtree_signal::SoftSignal;
///
/// let base = DeviceType::builder("Detector")
///     .component("exposure", Component::signal::<SoftSignal>("Exposure"))
///     .build()
///     .unwrap();
///
/// let camera = DeviceType::builder("Camera")
///     .extends(&base)
///     .field("ch", "a")
///     .component("ch", Component::signal::<SoftSignal>(Template::new("{prefix}{ch}")))
///     .build();
/// // `ch` is both a field and a component
/// assert!(camera.is_err());
/// ```
#[derive(Debug)]
pub struct DeviceTypeBuilder {
    name: String,
    bases: Vec<Arc<DeviceType>>,
    components: Vec<(String, Component)>,
    fields: Vec<(String, Value)>,
    stage_sigs: Vec<(String, Value)>,
}

impl DeviceTypeBuilder {
    /// Create new builder
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            components: Vec::new(),
            fields: Vec::new(),
            stage_sigs: Vec::new(),
        }
    }

    /// Inherit from a registered type
    ///
    /// Several bases merge in order; a later base overrides an earlier one.
    #[inline]
    #[must_use]
    pub fn extends(mut self, base: &Arc<DeviceType>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    /// Declare a component
    #[inline]
    #[must_use]
    pub fn component(mut self, attr: impl Into<String>, component: Component) -> Self {
        self.components.push((attr.into(), component));
        self
    }

    /// Declare an instance field with its default
    #[inline]
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.push((key.into(), default.into()));
        self
    }

    /// Declare a value a signal component holds while staged
    #[inline]
    #[must_use]
    pub fn stage_sig(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.stage_sigs.push((attr.into(), value.into()));
        self
    }

    /// Validate and register the type
    ///
    /// # Errors
    /// Returns [`DefinitionError`] if a declaration breaks a structural rule
    pub fn build(self) -> Result<Arc<DeviceType>, DefinitionError> {
        let type_name = self.name;

        let mut lineage = Vec::new();
        let mut components: IndexMap<String, Component> = IndexMap::new();
        let mut fields: IndexMap<String, Value> = IndexMap::new();
        let mut stage_sigs: IndexMap<String, Value> = IndexMap::new();

        // Inherited declarations keep their slot when overridden
        for base in &self.bases {
            lineage.push(base.name.clone());
            lineage.extend(base.lineage.iter().cloned());
            for (attr, cpt) in &base.components {
                components.insert(attr.clone(), cpt.clone());
            }
            for (key, value) in &base.fields {
                fields.insert(key.clone(), value.clone());
            }
            for (attr, value) in &base.stage_sigs {
                stage_sigs.insert(attr.clone(), value.clone());
            }
        }

        let mut declared = HashSet::new();
        for (attr, cpt) in self.components {
            if !is_identifier(&attr) {
                return Err(DefinitionError::InvalidAttrName {
                    type_name,
                    attr,
                });
            }
            if is_reserved(&attr) {
                return Err(DefinitionError::ReservedName { type_name, attr });
            }
            if !declared.insert(attr.clone()) {
                return Err(DefinitionError::DuplicateComponent { type_name, attr });
            }
            components.insert(attr, cpt);
        }

        let mut declared_fields = HashSet::new();
        for (key, value) in self.fields {
            if !is_identifier(&key) {
                return Err(DefinitionError::InvalidAttrName {
                    type_name,
                    attr: key,
                });
            }
            if is_reserved(&key) || BUILTIN_PLACEHOLDERS.contains(&key.as_str()) {
                return Err(DefinitionError::ReservedName {
                    type_name,
                    attr: key,
                });
            }
            if !declared_fields.insert(key.clone()) {
                return Err(DefinitionError::DuplicateField {
                    type_name,
                    field: key,
                });
            }
            fields.insert(key, value);
        }

        if let Some(field) = fields.keys().find(|key| components.contains_key(*key)) {
            return Err(DefinitionError::FieldCollision {
                type_name,
                field: field.clone(),
            });
        }

        for (attr, cpt) in &components {
            if let Some(template) = cpt.suffix().template() {
                if let Err(source) = template.check() {
                    return Err(DefinitionError::MalformedTemplate {
                        type_name,
                        attr: attr.clone(),
                        source,
                    });
                }
            }
        }

        // Inherited stage signals are checked against the final roster too
        stage_sigs.extend(self.stage_sigs);
        for attr in stage_sigs.keys() {
            let reason = match components.get(attr).map(Component::kind) {
                Some(ComponentKind::Signal { .. }) => continue,
                Some(ComponentKind::Device(_)) => "component is a device",
                None => "no such component",
            };
            return Err(DefinitionError::InvalidStageSignal {
                type_name,
                attr: attr.clone(),
                reason: reason.to_string(),
            });
        }

        tracing::debug!(
            device_type = %type_name,
            components = components.len(),
            fields = fields.len(),
            "registered device type"
        );

        Ok(Arc::new(DeviceType {
            name: type_name,
            lineage,
            components,
            fields,
            stage_sigs,
        }))
    }
}

/// Structural errors, raised while registering a type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// Declared name shadows a structural attribute
    #[error("'{type_name}' cannot declare reserved attribute '{attr}'")]
    ReservedName { type_name: String, attr: String },

    /// Same component declared twice in one type
    #[error("'{type_name}' declares component '{attr}' more than once")]
    DuplicateComponent { type_name: String, attr: String },

    /// Same field declared twice in one type
    #[error("'{type_name}' declares field '{field}' more than once")]
    DuplicateField { type_name: String, field: String },

    /// Name is not an identifier
    #[error("'{type_name}' declares invalid attribute name '{attr}'")]
    InvalidAttrName { type_name: String, attr: String },

    /// Field and component share a name
    #[error("'{type_name}' field '{field}' collides with a component")]
    FieldCollision { type_name: String, field: String },

    /// Suffix template does not parse
    #[error("'{type_name}' component '{attr}' has a malformed template: {source}")]
    MalformedTemplate {
        type_name: String,
        attr: String,
        #[source]
        source: TemplateError,
    },

    /// Stage signal does not name a signal component
    #[error("'{type_name}' stage signal '{attr}' is invalid: {reason}")]
    InvalidStageSignal {
        type_name: String,
        attr: String,
        reason: String,
    },
}

impl DefinitionError {
    /// Type whose registration failed
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::ReservedName { type_name, .. }
            | Self::DuplicateComponent { type_name, .. }
            | Self::DuplicateField { type_name, .. }
            | Self::InvalidAttrName { type_name, .. }
            | Self::FieldCollision { type_name, .. }
            | Self::MalformedTemplate { type_name, .. }
            | Self::InvalidStageSignal { type_name, .. } => type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use devtree_signal::SoftSignal;
    use proptest::prelude::*;

    fn soft(suffix: &str) -> Component {
        Component::signal::<SoftSignal>(suffix)
    }

    fn three_signals(name: &str) -> Arc<DeviceType> {
        DeviceType::builder(name)
            .component("cpt1", soft("1"))
            .component("cpt2", soft("2"))
            .component("cpt3", soft("3"))
            .build()
            .unwrap()
    }

    #[test]
    fn roster_in_declaration_order() {
        let ty = three_signals("SubDevice");
        assert_eq!(ty.signal_names().collect::<Vec<_>>(), vec!["cpt1", "cpt2", "cpt3"]);
        assert_eq!(ty.index_of("cpt2"), Some(1));
        assert_eq!(ty.entry("cpt3").map(|(index, _)| index), Some(2));
        assert!(ty.entry("cpt4").is_none());
        assert_eq!(ty.component_at(2).map(|(attr, _)| attr), Some("cpt3"));
    }

    #[test]
    fn empty_subclass_inherits_roster() {
        let base = three_signals("SubDevice");
        let derived = DeviceType::builder("SubSubDevice")
            .extends(&base)
            .build()
            .unwrap();

        assert_eq!(
            derived.signal_names().collect::<Vec<_>>(),
            vec!["cpt1", "cpt2", "cpt3"]
        );
        assert!(derived.is_a("SubDevice"));
        assert!(derived.is_a("SubSubDevice"));
        assert!(!base.is_a("SubSubDevice"));
    }

    #[test]
    fn inherited_first_own_appended() {
        let base = three_signals("Base");
        let derived = DeviceType::builder("Derived")
            .extends(&base)
            .component("extra", soft("X"))
            .build()
            .unwrap();

        assert_eq!(
            derived.signal_names().collect::<Vec<_>>(),
            vec!["cpt1", "cpt2", "cpt3", "extra"]
        );
    }

    #[test]
    fn override_keeps_inherited_slot() {
        let base = three_signals("Base");
        let derived = DeviceType::builder("Derived")
            .extends(&base)
            .component("cpt2", soft("TWO").with_config_default(true))
            .build()
            .unwrap();

        assert_eq!(
            derived.signal_names().collect::<Vec<_>>(),
            vec!["cpt1", "cpt2", "cpt3"]
        );
        assert!(derived.component("cpt2").unwrap().is_config_default());
        assert!(!base.component("cpt2").unwrap().is_config_default());
    }

    #[test]
    fn later_base_wins() {
        let a = DeviceType::builder("A")
            .component("x", soft("A"))
            .build()
            .unwrap();
        let b = DeviceType::builder("B")
            .component("x", soft("B").with_read_default(false))
            .build()
            .unwrap();
        let both = DeviceType::builder("AB").extends(&a).extends(&b).build().unwrap();

        assert_eq!(both.len(), 1);
        assert!(!both.component("x").unwrap().is_read_default());
        assert_eq!(both.lineage(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn every_reserved_name_is_rejected() {
        for attr in RESERVED_NAMES {
            let result = DeviceType::builder("a").component(attr, soft("1")).build();
            assert_eq!(
                result.unwrap_err(),
                DefinitionError::ReservedName {
                    type_name: "a".into(),
                    attr: attr.into(),
                }
            );
        }
    }

    #[test]
    fn plain_name_is_legal() {
        assert!(DeviceType::builder("a").component("a", soft("1")).build().is_ok());
    }

    #[test]
    fn duplicate_component_rejected() {
        let result = DeviceType::builder("Dup")
            .component("x", soft("1"))
            .component("x", soft("2"))
            .build();
        assert!(matches!(result, Err(DefinitionError::DuplicateComponent { .. })));
    }

    #[test]
    fn invalid_attr_name_rejected() {
        let result = DeviceType::builder("Bad")
            .component("sub.cpt", soft("1"))
            .build();
        assert!(matches!(result, Err(DefinitionError::InvalidAttrName { .. })));
    }

    #[test]
    fn malformed_template_rejected_at_registration() {
        let result = DeviceType::builder("Bad")
            .component("ch", Component::signal::<SoftSignal>(Template::new("{prefix")))
            .build();
        assert!(matches!(result, Err(DefinitionError::MalformedTemplate { .. })));
    }

    #[test]
    fn unknown_template_field_is_not_checked_at_registration() {
        let result = DeviceType::builder("Lazy")
            .component("ch", Component::signal::<SoftSignal>(Template::new("{prefix}{later}")))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn field_rules() {
        let reserved = DeviceType::builder("F").field("prefix", "x").build();
        assert!(matches!(reserved, Err(DefinitionError::ReservedName { .. })));

        let collision = DeviceType::builder("F")
            .component("ch", soft("1"))
            .field("ch", "a")
            .build();
        assert!(matches!(collision, Err(DefinitionError::FieldCollision { .. })));

        let dup = DeviceType::builder("F").field("ch", "a").field("ch", "b").build();
        assert!(matches!(dup, Err(DefinitionError::DuplicateField { .. })));

        let ok = DeviceType::builder("F").field("ch", "a").build().unwrap();
        assert_eq!(ok.fields()["ch"], Value::from("a"));
    }

    #[test]
    fn stage_sig_must_name_signal() {
        let sub = three_signals("Sub");
        let missing = DeviceType::builder("S").stage_sig("nope", 1).build();
        assert!(matches!(missing, Err(DefinitionError::InvalidStageSignal { .. })));

        let device = DeviceType::builder("S")
            .component("sub", Component::device(&sub, "S:"))
            .stage_sig("sub", 1)
            .build();
        assert!(matches!(device, Err(DefinitionError::InvalidStageSignal { .. })));

        let ok = DeviceType::builder("S")
            .component("mode", soft("Mode"))
            .stage_sig("mode", "acquire")
            .build()
            .unwrap();
        assert_eq!(ok.stage_sigs().len(), 1);
    }

    #[test]
    fn inherited_stage_sig_rechecked_against_override() {
        let sub = three_signals("Sub");
        let base = DeviceType::builder("Base")
            .component("mode", soft("Mode"))
            .stage_sig("mode", 1)
            .build()
            .unwrap();

        let derived = DeviceType::builder("Derived")
            .extends(&base)
            .component("mode", Component::device(&sub, "M:"))
            .build();
        assert_eq!(
            derived.unwrap_err(),
            DefinitionError::InvalidStageSignal {
                type_name: "Derived".into(),
                attr: "mode".into(),
                reason: "component is a device".into(),
            }
        );

        // overriding with another signal keeps the inherited stage signal
        let resignaled = DeviceType::builder("Resignaled")
            .extends(&base)
            .component("mode", soft("Mode2"))
            .build()
            .unwrap();
        assert_eq!(resignaled.stage_sigs()["mode"], Value::from(1));
    }

    #[test]
    fn default_sets_follow_flags() {
        let ty = DeviceType::builder("Flags")
            .component("a", soft("A"))
            .component("b", soft("B").with_read_default(false).with_config_default(true))
            .component("c", soft("C").with_config_default(true))
            .build()
            .unwrap();

        assert_eq!(ty.default_read_attrs(), vec!["a", "c"]);
        assert_eq!(ty.default_configuration_attrs(), vec!["b", "c"]);
    }

    proptest! {
        #[test]
        fn prop_non_reserved_identifiers_register(attr in "[a-z_][a-z0-9_]{0,12}") {
            let result = DeviceType::builder("P").component(attr.clone(), soft("1")).build();
            prop_assert_eq!(result.is_ok(), !is_reserved(&attr));
        }
    }
}
