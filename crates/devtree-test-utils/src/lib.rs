//! Testing utilities for devtree workspace
//!
//! Shared fake leaves, fixture device types and tracing setup.

#![allow(missing_docs)]

use devtree_component::{Component, DeviceType, SignalFactory, Template};
use devtree_signal::{
    conf_key, Descriptor, DescriptorMap, ParentRef, Reading, ReadingMap, Signal, SignalArgs,
    SignalError, SignalType, Value,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Leaf whose value is its own name
///
/// Configuration reads as `0` from `SIM:test`; `describe` reports the
/// channel it was built for as `PV:<suffix>`.
#[derive(Debug, Clone)]
pub struct FakeSignal {
    pub read_pv: String,
    name: String,
    parent: Option<ParentRef>,
}

impl Signal for FakeSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    fn get(&self) -> Result<Value, SignalError> {
        Ok(Value::from(self.name.clone()))
    }

    fn describe(&self) -> Result<DescriptorMap, SignalError> {
        let mut out = DescriptorMap::new();
        out.insert(
            self.name.clone(),
            Descriptor::new(format!("PV:{}", self.read_pv)).with_dtype("string"),
        );
        Ok(out)
    }

    fn read_configuration(&self) -> Result<ReadingMap, SignalError> {
        let mut out = ReadingMap::new();
        out.insert(conf_key(&self.name), Reading::new(0));
        Ok(out)
    }

    fn describe_configuration(&self) -> Result<DescriptorMap, SignalError> {
        let mut out = DescriptorMap::new();
        out.insert(conf_key(&self.name), Descriptor::new("SIM:test"));
        Ok(out)
    }
}

impl SignalType for FakeSignal {
    fn construct(args: SignalArgs<'_>) -> Result<Self, SignalError> {
        Ok(Self {
            read_pv: args.suffix,
            name: args.name,
            parent: args.parent,
        })
    }
}

/// Leaf that fails the operations listed in its `fail_on` kwarg
///
/// Recognized entries: `construct`, `get`, `describe`, `stage`, `unstage`.
#[derive(Debug, Clone)]
pub struct FailingSignal {
    name: String,
    parent: Option<ParentRef>,
    fail_on: Vec<String>,
}

impl FailingSignal {
    fn check(&self, op: &'static str) -> Result<(), SignalError> {
        if self.fail_on.iter().any(|f| f == op) {
            return Err(match op {
                "stage" | "unstage" => SignalError::Lifecycle {
                    name: self.name.clone(),
                    action: op,
                    reason: "injected failure".to_string(),
                },
                _ => SignalError::Unavailable {
                    name: self.name.clone(),
                    reason: format!("injected {op} failure"),
                },
            });
        }
        Ok(())
    }
}

impl Signal for FailingSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    fn get(&self) -> Result<Value, SignalError> {
        self.check("get")?;
        Ok(json!(0))
    }

    fn describe(&self) -> Result<DescriptorMap, SignalError> {
        self.check("describe")?;
        let mut out = DescriptorMap::new();
        out.insert(self.name.clone(), Descriptor::new("SIM:failing"));
        Ok(out)
    }

    fn stage(&mut self) -> Result<(), SignalError> {
        self.check("stage")
    }

    fn unstage(&mut self) -> Result<(), SignalError> {
        self.check("unstage")
    }
}

impl SignalType for FailingSignal {
    fn construct(args: SignalArgs<'_>) -> Result<Self, SignalError> {
        let fail_on: Vec<String> = match args.kwarg("fail_on") {
            None => Vec::new(),
            Some(Value::Array(ops)) => ops
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(other) => {
                return Err(SignalError::InvalidArguments {
                    name: args.name,
                    reason: format!("fail_on must be a list, got {other}"),
                })
            }
        };
        if fail_on.iter().any(|op| op == "construct") {
            return Err(SignalError::InvalidArguments {
                name: args.name,
                reason: "injected construct failure".to_string(),
            });
        }
        Ok(Self {
            name: args.name,
            parent: args.parent,
            fail_on,
        })
    }
}

/// Failing component for the given operations
pub fn failing(suffix: &str, fail_on: &[&str]) -> Component {
    Component::signal::<FailingSignal>(suffix).with_kwarg("fail_on", json!(fail_on))
}

/// Shared record of lifecycle calls, in call order
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: String) {
        self.inner.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.inner.lock().clone()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Component whose leaf records `stage:<name>` / `unstage:<name>` here
    pub fn component(&self, suffix: &str) -> Component {
        let log = self.clone();
        let factory: SignalFactory = Arc::new(
            move |args: SignalArgs<'_>| -> Result<Box<dyn Signal>, SignalError> {
                Ok(Box::new(TrackingSignal {
                    name: args.name,
                    parent: args.parent,
                    staged: false,
                    log: log.clone(),
                }))
            },
        );
        Component::from_factory("TrackingSignal", factory, suffix)
    }
}

/// Leaf reporting whether it is staged as its value
#[derive(Debug)]
pub struct TrackingSignal {
    name: String,
    parent: Option<ParentRef>,
    staged: bool,
    log: EventLog,
}

impl Signal for TrackingSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    fn get(&self) -> Result<Value, SignalError> {
        Ok(Value::Bool(self.staged))
    }

    fn describe(&self) -> Result<DescriptorMap, SignalError> {
        let mut out = DescriptorMap::new();
        out.insert(self.name.clone(), Descriptor::new("SIM:tracking").with_dtype("boolean"));
        Ok(out)
    }

    fn stage(&mut self) -> Result<(), SignalError> {
        self.staged = true;
        self.log.push(format!("stage:{}", self.name));
        Ok(())
    }

    fn unstage(&mut self) -> Result<(), SignalError> {
        self.staged = false;
        self.log.push(format!("unstage:{}", self.name));
        Ok(())
    }
}

/// Three fake signals `cpt1`..`cpt3` with suffixes `1`..`3`
pub fn sub_device_type() -> Arc<DeviceType> {
    DeviceType::builder("SubDevice")
        .component("cpt1", Component::signal::<FakeSignal>("1"))
        .component("cpt2", Component::signal::<FakeSignal>("2"))
        .component("cpt3", Component::signal::<FakeSignal>("3"))
        .build()
        .unwrap()
}

/// Empty extension of [`sub_device_type`]
pub fn sub_sub_device_type() -> Arc<DeviceType> {
    DeviceType::builder("SubSubDevice")
        .extends(&sub_device_type())
        .build()
        .unwrap()
}

/// Two sub-devices and a signal
pub fn complex_device_type() -> Arc<DeviceType> {
    DeviceType::builder("MyDevice")
        .component("sub_cpt1", Component::device(&sub_device_type(), "1"))
        .component("sub_cpt2", Component::device(&sub_sub_device_type(), "2"))
        .component("cpt3", Component::signal::<FakeSignal>("3"))
        .build()
        .unwrap()
}

/// A literal component plus one formatted from the `_ch` field
pub fn formatted_device_type() -> Arc<DeviceType> {
    DeviceType::builder("FormattedDevice")
        .field("_ch", "a")
        .component("cpt", Component::signal::<FakeSignal>("suffix"))
        .component("ch", Component::signal::<FakeSignal>(Template::new("{prefix}{_ch}")))
        .build()
        .unwrap()
}
