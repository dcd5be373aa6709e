//! In-memory signal
//!
//! [`SoftSignal`] keeps its value locally. It is the default leaf for
//! simulated devices and for holding purely software-side settings.

use crate::signal::{ParentRef, Signal, SignalArgs, SignalError, SignalType};
use crate::value::{Descriptor, DescriptorMap, Reading, ReadingMap, Value};
use chrono::Utc;

/// Signal backed by a local value
///
/// Recognized keyword arguments:
/// - `value`: initial value (default `null`)
/// - `read_only`: reject `put` (default `false`)
#[derive(Debug, Clone)]
pub struct SoftSignal {
    name: String,
    source: String,
    parent: Option<ParentRef>,
    value: Value,
    timestamp: f64,
    read_only: bool,
}

impl SoftSignal {
    /// Free-standing signal with an initial value
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        Self {
            source: format!("SIM:{name}"),
            name,
            parent: None,
            value: value.into(),
            timestamp: now(),
            read_only: false,
        }
    }

    /// Mark read-only
    #[inline]
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Source reported by `describe`
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Time of the last write, seconds since the Unix epoch
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

fn now() -> f64 {
    // Millisecond precision is what readings carry
    #[allow(clippy::cast_precision_loss)]
    let millis = Utc::now().timestamp_millis() as f64;
    millis / 1000.0
}

impl Signal for SoftSignal {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    fn get(&self) -> Result<Value, SignalError> {
        Ok(self.value.clone())
    }

    fn put(&mut self, value: Value) -> Result<(), SignalError> {
        if self.read_only {
            return Err(SignalError::ReadOnly {
                name: self.name.clone(),
            });
        }
        tracing::trace!(signal = %self.name, %value, "put");
        self.value = value;
        self.timestamp = now();
        Ok(())
    }

    fn read(&self) -> Result<ReadingMap, SignalError> {
        let mut out = ReadingMap::new();
        out.insert(
            self.name.clone(),
            Reading::at(self.value.clone(), self.timestamp),
        );
        Ok(out)
    }

    fn describe(&self) -> Result<DescriptorMap, SignalError> {
        let mut out = DescriptorMap::new();
        out.insert(
            self.name.clone(),
            Descriptor::for_value(self.source.clone(), &self.value),
        );
        Ok(out)
    }
}

impl SignalType for SoftSignal {
    fn construct(args: SignalArgs<'_>) -> Result<Self, SignalError> {
        let read_only = match args.kwarg("read_only") {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(SignalError::InvalidArguments {
                    name: args.name,
                    reason: format!("read_only must be a boolean, got {other}"),
                })
            }
        };

        Ok(Self {
            source: format!("SIM:{}", args.suffix),
            value: args.kwarg("value").cloned().unwrap_or(Value::Null),
            name: args.name,
            parent: args.parent,
            timestamp: now(),
            read_only,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::InstanceId;
    use crate::value::Kwargs;
    use serde_json::json;

    #[test]
    fn soft_signal_put_and_get() {
        let mut sig = SoftSignal::new("x", 1);
        sig.put(json!(2)).unwrap();
        assert_eq!(sig.get().unwrap(), json!(2));
    }

    #[test]
    fn soft_signal_read_only_rejects_put() {
        let mut sig = SoftSignal::new("x", 1).read_only();
        assert!(matches!(
            sig.put(json!(2)),
            Err(SignalError::ReadOnly { .. })
        ));
        assert_eq!(sig.get().unwrap(), json!(1));
    }

    #[test]
    fn soft_signal_read_carries_timestamp() {
        let sig = SoftSignal::new("x", 1);
        let read = sig.read().unwrap();
        assert_eq!(read["x"].timestamp, Some(sig.timestamp()));
    }

    #[test]
    fn soft_signal_describe_has_source() {
        let sig = SoftSignal::new("x", 1.5);
        let desc = sig.describe().unwrap();
        assert_eq!(desc["x"].source, "SIM:x");
        assert_eq!(desc["x"].dtype.as_deref(), Some("number"));
    }

    #[test]
    fn construct_from_args() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("value".into(), json!("idle"));
        let parent = ParentRef::new(InstanceId::new(), "dev");

        let sig = SoftSignal::construct(SignalArgs {
            suffix: "XF:31{Dev}State".into(),
            name: "dev_state".into(),
            parent: Some(parent.clone()),
            kwargs: &kwargs,
        })
        .unwrap();

        assert_eq!(sig.name(), "dev_state");
        assert_eq!(sig.source(), "SIM:XF:31{Dev}State");
        assert_eq!(sig.parent(), Some(&parent));
        assert_eq!(sig.get().unwrap(), json!("idle"));
    }

    #[test]
    fn construct_rejects_bad_read_only_flag() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("read_only".into(), json!("yes"));

        let result = SoftSignal::construct(SignalArgs {
            suffix: "x".into(),
            name: "dev_x".into(),
            parent: None,
            kwargs: &kwargs,
        });

        assert!(matches!(result, Err(SignalError::InvalidArguments { .. })));
    }
}
