//! Recursive aggregation
//!
//! `read`/`describe` walk the read set, `read_configuration`/
//! `describe_configuration` walk the configuration set. A signal entry
//! contributes its own map; a sub-device entry recurses into the
//! sub-device's own set. Either the whole map is produced or an error.

use crate::attrs::AttrSet;
use crate::config::DuplicateKeyPolicy;
use crate::device::{Child, Device};
use crate::error::{AggregationError, DeviceError};
use devtree_signal::{DescriptorMap, ReadingMap, Signal, SignalError};
use indexmap::IndexMap;

type LeafOp<T> = fn(&dyn Signal) -> Result<IndexMap<String, T>, SignalError>;
type NestedOp<T> = fn(&Device) -> Result<IndexMap<String, T>, DeviceError>;

impl Device {
    /// Readings of the read set
    ///
    /// # Errors
    /// Propagates leaf and construction failures; rejects duplicate keys
    /// unless configured otherwise
    pub fn read(&self) -> Result<ReadingMap, DeviceError> {
        self.aggregate(AttrSet::Read, |signal: &dyn Signal| signal.read(), Device::read)
    }

    /// Metadata of the read set, keyed exactly like [`Device::read`]
    ///
    /// # Errors
    /// See [`Device::read`]
    pub fn describe(&self) -> Result<DescriptorMap, DeviceError> {
        self.aggregate(
            AttrSet::Read,
            |signal: &dyn Signal| signal.describe(),
            Device::describe,
        )
    }

    /// Configuration readings, keyed `<name>_conf`
    ///
    /// # Errors
    /// See [`Device::read`]
    pub fn read_configuration(&self) -> Result<ReadingMap, DeviceError> {
        self.aggregate(
            AttrSet::Configuration,
            |signal: &dyn Signal| signal.read_configuration(),
            Device::read_configuration,
        )
    }

    /// Configuration metadata, keyed exactly like
    /// [`Device::read_configuration`]
    ///
    /// # Errors
    /// See [`Device::read`]
    pub fn describe_configuration(&self) -> Result<DescriptorMap, DeviceError> {
        self.aggregate(
            AttrSet::Configuration,
            |signal: &dyn Signal| signal.describe_configuration(),
            Device::describe_configuration,
        )
    }

    fn aggregate<T>(
        &self,
        set: AttrSet,
        leaf: LeafOp<T>,
        nested: NestedOp<T>,
    ) -> Result<IndexMap<String, T>, DeviceError> {
        let mut out = IndexMap::new();
        for attr in self.attrs(set) {
            let part = match self.child(attr)? {
                Child::Signal(signal) => leaf(signal.as_ref())?,
                Child::Device(device) => nested(device)?,
            };
            self.merge(&mut out, part)?;
        }

        tracing::trace!(device = %self.name(), set = %set, keys = out.len(), "aggregated");
        Ok(out)
    }

    fn merge<T>(
        &self,
        out: &mut IndexMap<String, T>,
        part: IndexMap<String, T>,
    ) -> Result<(), AggregationError> {
        let policy = self.config().duplicate_keys;
        for (key, value) in part {
            if policy == DuplicateKeyPolicy::Reject && out.contains_key(&key) {
                return Err(AggregationError::DuplicateKey {
                    device: self.name().to_string(),
                    key,
                });
            }
            out.insert(key, value);
        }
        Ok(())
    }
}
