//! Attribute-set filtering
//!
//! Each device carries three ordered subsets of its roster: the read set,
//! the configuration set and the monitor set. Entries may be dotted
//! (`sub.cpt`); the head lands in this device's set and the remainder is
//! assigned into the named sub-device's own set.

use crate::device::Device;
use crate::error::{DeviceError, ValidationError};
use devtree_component::{AttrPath, Component, DeviceType};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Which attribute set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrSet {
    /// Drives `read` and `describe`
    Read,
    /// Drives `read_configuration`, `describe_configuration` and `configure`
    Configuration,
    /// Selected for monitoring; no aggregation reads it
    Monitor,
}

impl AttrSet {
    /// All sets
    pub const ALL: [Self; 3] = [Self::Read, Self::Configuration, Self::Monitor];

    /// Attribute name of the set on a device
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read_attrs",
            Self::Configuration => "configuration_attrs",
            Self::Monitor => "monitor_attrs",
        }
    }
}

impl Display for AttrSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated shape of one assignment, per device level
#[derive(Debug, Default)]
struct Plan {
    own: IndexSet<String>,
    nested: IndexMap<String, Plan>,
}

impl Plan {
    fn new(paths: impl IntoIterator<Item = AttrPath>) -> Self {
        let mut plan = Self::default();
        for path in paths {
            plan.add(&path);
        }
        plan
    }

    fn add(&mut self, path: &AttrPath) {
        self.own.insert(path.head().to_string());
        if let Some(rest) = path.rest() {
            self.nested
                .entry(path.head().to_string())
                .or_default()
                .add(&rest);
        }
    }

    /// Type-level check of the whole tree of assignments
    fn validate(
        &self,
        device_type: &DeviceType,
        device: &str,
        separator: &str,
    ) -> Result<(), ValidationError> {
        if let Some(attr) = self.own.iter().find(|attr| device_type.component(attr).is_none()) {
            return Err(ValidationError::UnknownAttribute {
                device: device.to_string(),
                attr: attr.clone(),
            });
        }
        for (attr, nested) in &self.nested {
            match device_type.component(attr).and_then(Component::device_type) {
                Some(child_type) => {
                    nested.validate(child_type, &format!("{device}{separator}{attr}"), separator)?;
                }
                None => {
                    return Err(ValidationError::NotADevice {
                        device: device.to_string(),
                        attr: attr.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Construct every sub-device the assignment reaches into
    fn prepare(&self, device: &Device) -> Result<(), DeviceError> {
        for (attr, nested) in &self.nested {
            nested.prepare(device.device(attr)?)?;
        }
        Ok(())
    }

    fn apply(self, device: &mut Device, set: AttrSet) -> Result<(), DeviceError> {
        *device.attrs_mut(set) = self.own.into_iter().collect();
        for (attr, nested) in self.nested {
            nested.apply(device.device_mut(&attr)?, set)?;
        }
        Ok(())
    }
}

impl Device {
    /// Current members of a set
    #[inline]
    #[must_use]
    pub fn attrs(&self, set: AttrSet) -> &[String] {
        match set {
            AttrSet::Read => &self.read_attrs,
            AttrSet::Configuration => &self.configuration_attrs,
            AttrSet::Monitor => &self.monitor_attrs,
        }
    }

    fn attrs_mut(&mut self, set: AttrSet) -> &mut Vec<String> {
        match set {
            AttrSet::Read => &mut self.read_attrs,
            AttrSet::Configuration => &mut self.configuration_attrs,
            AttrSet::Monitor => &mut self.monitor_attrs,
        }
    }

    /// Read set
    #[inline]
    #[must_use]
    pub fn read_attrs(&self) -> &[String] {
        &self.read_attrs
    }

    /// Configuration set
    #[inline]
    #[must_use]
    pub fn configuration_attrs(&self) -> &[String] {
        &self.configuration_attrs
    }

    /// Monitor set
    #[inline]
    #[must_use]
    pub fn monitor_attrs(&self) -> &[String] {
        &self.monitor_attrs
    }

    /// Replace a set
    ///
    /// Dotted entries assign their remainder into the sub-device's own set.
    /// Repeated entries keep their first position. The whole assignment,
    /// nested parts included, is validated before anything changes.
    ///
    /// # Errors
    /// Returns a validation error for malformed paths, unknown names or paths
    /// through a signal; sub-device construction failures also abort before
    /// any set changes
    pub fn set_attrs<I, S>(&mut self, set: AttrSet, attrs: I) -> Result<(), DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = attrs
            .into_iter()
            .map(|attr| attr.as_ref().parse::<AttrPath>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ValidationError::from)?;

        let plan = Plan::new(paths);
        plan.validate(&self.device_type, &self.name, &self.config.name_separator)?;
        plan.prepare(self)?;

        tracing::debug!(
            device = %self.name,
            set = %set,
            attrs = ?plan.own,
            nested = plan.nested.len(),
            "assigning attribute set"
        );
        plan.apply(self, set)
    }

    /// Replace the read set
    ///
    /// # Errors
    /// See [`Device::set_attrs`]
    pub fn set_read_attrs<I, S>(&mut self, attrs: I) -> Result<(), DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_attrs(AttrSet::Read, attrs)
    }

    /// Replace the configuration set
    ///
    /// # Errors
    /// See [`Device::set_attrs`]
    pub fn set_configuration_attrs<I, S>(&mut self, attrs: I) -> Result<(), DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_attrs(AttrSet::Configuration, attrs)
    }

    /// Replace the monitor set
    ///
    /// # Errors
    /// See [`Device::set_attrs`]
    pub fn set_monitor_attrs<I, S>(&mut self, attrs: I) -> Result<(), DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_attrs(AttrSet::Monitor, attrs)
    }
}
