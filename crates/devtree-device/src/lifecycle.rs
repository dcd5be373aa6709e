//! Staging and configuration lifecycle
//!
//! # Staging order
//! `stage()` is parent-first: the device marks itself staged, applies its
//! stage signals, then stages each child in roster order. `unstage()` walks
//! every constructed child in reverse roster order, then restores the stage
//! signals' original values in reverse, and finally marks the device
//! unstaged. A failed `stage()` rolls back only what that call staged.
//!
//! Staging a staged device does nothing and returns no names. Unstaging an
//! unstaged device is legal.

use crate::device::{Child, Device};
use crate::error::{DeviceError, StageError, ValidationError};
use devtree_component::{AttrPath, Component};
use devtree_signal::{Kwargs, ReadingMap, Signal, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Staging state of one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Not holding staged resources
    #[default]
    Unstaged,
    /// Staged, possibly partially if rollback is disabled
    Staged,
}

/// `configure` options for one device, grouped by target
#[derive(Debug, Default)]
struct Options {
    puts: Vec<(String, Value)>,
    nested: IndexMap<String, Kwargs>,
}

impl Device {
    /// Current staging state
    #[inline]
    #[must_use]
    pub fn stage_state(&self) -> StageState {
        self.state
    }

    /// Check if staged
    #[inline]
    #[must_use]
    pub fn is_staged(&self) -> bool {
        self.state == StageState::Staged
    }

    /// Stage this device and its subtree
    ///
    /// Returns the names staged by this call: this device first, then its
    /// descendants in roster order.
    ///
    /// # Errors
    /// Returns [`StageError::ChildFailed`] if a stage signal or child fails.
    /// With rollback enabled (the default) the children staged by this call
    /// are unstaged in reverse and its stage signals restored; sub-devices
    /// that were already staged are left alone. If that rollback fails too
    /// the error is [`StageError::RollbackFailed`].
    pub fn stage(&mut self) -> Result<Vec<String>, DeviceError> {
        if self.is_staged() {
            tracing::debug!(device = %self.name, "already staged");
            return Ok(Vec::new());
        }

        self.state = StageState::Staged;
        let mut staged = vec![self.name.clone()];

        let stage_sigs: Vec<(String, Value)> = self
            .device_type
            .stage_sigs()
            .iter()
            .map(|(attr, value)| (attr.clone(), value.clone()))
            .collect();
        for (attr, value) in stage_sigs {
            if let Err(err) = self.apply_stage_sig(&attr, value) {
                return Err(self.abort_stage(attr, err, &[]));
            }
        }

        // children this call staged, in order
        let mut owned: Vec<String> = Vec::new();
        let roster: Vec<String> = self.signal_names().map(str::to_string).collect();
        for attr in roster {
            match self.stage_child(&attr) {
                Ok(names) if names.is_empty() => {}
                Ok(names) => {
                    staged.extend(names);
                    owned.push(attr);
                }
                Err(err) => return Err(self.abort_stage(attr, err, &owned)),
            }
        }

        tracing::debug!(device = %self.name, count = staged.len(), "staged");
        Ok(staged)
    }

    fn apply_stage_sig(&mut self, attr: &str, value: Value) -> Result<(), DeviceError> {
        let signal = self.signal_mut(attr)?;
        let original = signal.get()?;
        signal.put(value)?;
        self.stage_originals.push((attr.to_string(), original));
        Ok(())
    }

    fn stage_child(&mut self, attr: &str) -> Result<Vec<String>, DeviceError> {
        match self.child_mut(attr)? {
            Child::Signal(signal) => {
                signal.stage()?;
                Ok(vec![signal.name().to_string()])
            }
            Child::Device(device) => device.stage(),
        }
    }

    /// The failed child is not visited again: a failed sub-device has
    /// already handled its own subtree.
    fn abort_stage(&mut self, attr: String, err: DeviceError, owned: &[String]) -> DeviceError {
        let device = self.name.clone();
        if !self.config.rollback_on_stage_failure {
            tracing::warn!(%device, %attr, error = %err, "stage failed, leaving partial state");
            return StageError::ChildFailed {
                device,
                attr,
                rolled_back: false,
                source: Box::new(err),
            }
            .into();
        }

        tracing::warn!(%device, %attr, error = %err, owned = owned.len(), "stage failed, rolling back");
        let source = Box::new(err);
        let failures = self.rollback(owned);
        let err = if failures.is_empty() {
            StageError::ChildFailed {
                device,
                attr,
                rolled_back: true,
                source,
            }
        } else {
            StageError::RollbackFailed {
                device,
                attr,
                source,
                failures,
            }
        };
        err.into()
    }

    fn rollback(&mut self, owned: &[String]) -> Vec<DeviceError> {
        let mut failures = Vec::new();
        for attr in owned.iter().rev() {
            let result = match self.child_mut(attr) {
                Ok(Child::Signal(signal)) => signal.unstage().map_err(DeviceError::from),
                Ok(Child::Device(device)) => device.unstage().map(|_| ()),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                failures.push(err);
            }
        }
        failures.extend(self.restore_stage_sigs());
        self.state = StageState::Unstaged;
        failures
    }

    fn restore_stage_sigs(&mut self) -> Vec<DeviceError> {
        let originals = std::mem::take(&mut self.stage_originals);
        originals
            .into_iter()
            .rev()
            .filter_map(|(attr, value)| {
                self.signal_mut(&attr)
                    .and_then(|signal| signal.put(value).map_err(DeviceError::from))
                    .err()
            })
            .collect()
    }

    /// Unstage this device and its subtree
    ///
    /// Never stops at the first failure. Returns the names unstaged: the
    /// constructed descendants that were staged, in reverse roster order,
    /// then this device if it was staged. Leaves are asked to unstage even
    /// when this device is not staged.
    ///
    /// # Errors
    /// Returns [`StageError::UnstageFailed`] carrying every failure
    pub fn unstage(&mut self) -> Result<Vec<String>, DeviceError> {
        let was_staged = self.is_staged();
        let mut unstaged = Vec::new();
        let mut failures: Vec<DeviceError> = Vec::new();

        for cell in self.children.iter_mut().rev() {
            let Some(child) = cell.get_mut() else {
                continue;
            };
            match child {
                Child::Signal(signal) => match signal.unstage() {
                    Ok(()) if was_staged => unstaged.push(signal.name().to_string()),
                    Ok(()) => {}
                    Err(err) => failures.push(err.into()),
                },
                Child::Device(device) => match device.unstage() {
                    Ok(names) => unstaged.extend(names),
                    Err(err) => failures.push(err),
                },
            }
        }

        failures.extend(self.restore_stage_sigs());

        if was_staged {
            unstaged.push(self.name.clone());
        }
        self.state = StageState::Unstaged;

        if failures.is_empty() {
            tracing::debug!(device = %self.name, count = unstaged.len(), "unstaged");
            Ok(unstaged)
        } else {
            tracing::warn!(device = %self.name, failures = failures.len(), "unstage incomplete");
            Err(StageError::UnstageFailed {
                device: self.name.clone(),
                failures,
            }
            .into())
        }
    }

    /// Apply configuration options, returning `(old, new)` snapshots of
    /// [`Device::read_configuration`]
    ///
    /// Keys may be dotted (`sub.cpt`). The head of every key must be in the
    /// configuration set. Signal targets are written with `put`; sub-device
    /// targets are configured recursively, either through dotted keys or with
    /// an object value holding the sub-device's own options. Every key is
    /// validated, recursively, before anything is written. If a write fails,
    /// the values already written are put back in reverse order.
    ///
    /// # Errors
    /// Returns a validation error for keys outside the configuration set;
    /// propagates leaf failures
    pub fn configure(&mut self, options: &Kwargs) -> Result<(ReadingMap, ReadingMap), DeviceError> {
        let grouped = self.group_options(options)?;
        let old = self.read_configuration()?;

        let mut written = Vec::new();
        if let Err(err) = self.apply_options(grouped, &mut written) {
            self.revert(written);
            return Err(err);
        }

        let new = self.read_configuration()?;
        tracing::debug!(device = %self.name, keys = options.len(), "configured");
        Ok((old, new))
    }

    /// Write validated options, recording each leaf's previous value
    fn apply_options(
        &mut self,
        grouped: Options,
        written: &mut Vec<(AttrPath, Value)>,
    ) -> Result<(), DeviceError> {
        for (attr, value) in grouped.puts {
            let signal = self.signal_mut(&attr)?;
            let previous = signal.get()?;
            signal.put(value)?;
            written.push((AttrPath::single(attr).map_err(ValidationError::from)?, previous));
        }

        for (attr, nested) in grouped.nested {
            let device = self.device_mut(&attr)?;
            let grouped = device.group_options(&nested)?;
            let mut inner = Vec::new();
            let result = device.apply_options(grouped, &mut inner);
            for (path, previous) in inner {
                written.push((path.under(attr.as_str()).map_err(ValidationError::from)?, previous));
            }
            result?;
        }
        Ok(())
    }

    fn revert(&mut self, written: Vec<(AttrPath, Value)>) {
        for (path, previous) in written.into_iter().rev() {
            let restored = self
                .signal_at_mut(&path)
                .and_then(|signal| signal.put(previous).map_err(DeviceError::from));
            if let Err(err) = restored {
                tracing::warn!(device = %self.name, %path, error = %err, "cannot restore configuration");
            }
        }
    }

    fn signal_at_mut(&mut self, path: &AttrPath) -> Result<&mut dyn Signal, DeviceError> {
        match path.rest() {
            None => self.signal_mut(path.head()),
            Some(rest) => self.device_mut(path.head())?.signal_at_mut(&rest),
        }
    }

    fn group_options(&self, options: &Kwargs) -> Result<Options, DeviceError> {
        let mut grouped = Options::default();
        for (key, value) in options {
            let path: AttrPath = key.parse().map_err(ValidationError::from)?;
            let attr = path.head();
            if !self.configuration_attrs.iter().any(|a| a == attr) {
                return Err(ValidationError::NotConfigurable {
                    device: self.name.clone(),
                    key: key.clone(),
                }
                .into());
            }

            let is_device = self
                .device_type
                .component(attr)
                .is_some_and(Component::is_device);
            match (is_device, path.rest()) {
                (false, None) => grouped.puts.push((attr.to_string(), value.clone())),
                (false, Some(_)) => {
                    return Err(ValidationError::NotADevice {
                        device: self.name.clone(),
                        attr: attr.to_string(),
                    }
                    .into())
                }
                (true, Some(rest)) => {
                    grouped
                        .nested
                        .entry(attr.to_string())
                        .or_default()
                        .insert(rest.to_string(), value.clone());
                }
                (true, None) => {
                    let Value::Object(entries) = value else {
                        return Err(ValidationError::InvalidOption {
                            device: self.name.clone(),
                            key: key.clone(),
                            reason: "a sub-device takes an object of options".to_string(),
                        }
                        .into());
                    };
                    let nested = grouped.nested.entry(attr.to_string()).or_default();
                    for (sub_key, sub_value) in entries {
                        nested.insert(sub_key.clone(), sub_value.clone());
                    }
                }
            }
        }

        for (attr, nested) in &grouped.nested {
            self.device(attr)?.group_options(nested)?;
        }
        Ok(grouped)
    }
}
