//! Readings and metadata records
//!
//! Every aggregation operation produces an ordered map from a fully-qualified
//! signal name to one of these records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A signal value
///
/// Values are dynamically typed so heterogeneous trees can be aggregated into
/// a single map.
pub type Value = serde_json::Value;

/// Ordered map of fully-qualified name to reading
pub type ReadingMap = IndexMap<String, Reading>;

/// Ordered map of fully-qualified name to metadata
pub type DescriptorMap = IndexMap<String, Descriptor>;

/// Extra construction arguments handed to a child
pub type Kwargs = IndexMap<String, Value>;

/// A single value reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Current value
    pub value: Value,

    /// Seconds since the Unix epoch, if the source records one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Reading {
    /// Reading without a timestamp
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            timestamp: None,
        }
    }

    /// Reading stamped with the given time
    #[inline]
    #[must_use]
    pub fn at(value: impl Into<Value>, timestamp: f64) -> Self {
        Self {
            value: value.into(),
            timestamp: Some(timestamp),
        }
    }
}

/// Metadata describing a value
///
/// `source` is always present; the rest is filled in when the leaf knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Where the value comes from (e.g. `PV:XF:31ID{Mtr}`, `SIM:x`)
    pub source: String,

    /// JSON-schema style type name (`number`, `string`, `boolean`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,

    /// Array shape; empty for scalars
    #[serde(default)]
    pub shape: Vec<usize>,
}

impl Descriptor {
    /// Descriptor carrying only a source
    #[inline]
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dtype: None,
            shape: Vec::new(),
        }
    }

    /// Descriptor with type and shape inferred from a sample value
    #[must_use]
    pub fn for_value(source: impl Into<String>, value: &Value) -> Self {
        Self {
            source: source.into(),
            dtype: Some(dtype_of(value).to_string()),
            shape: shape_of(value),
        }
    }

    /// With explicit dtype
    #[inline]
    #[must_use]
    pub fn with_dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = Some(dtype.into());
        self
    }
}

/// Type name of a value
#[must_use]
pub fn dtype_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Shape of a value: outer array lengths, stopping at the first non-array
#[must_use]
pub fn shape_of(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(items) = current {
        shape.push(items.len());
        match items.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reading_without_timestamp_serializes_value_only() {
        let reading = Reading::new(0);
        let encoded = serde_json::to_value(&reading).unwrap();
        assert_eq!(encoded, json!({ "value": 0 }));
    }

    #[test]
    fn reading_at_keeps_timestamp() {
        let reading = Reading::at("abc", 12.5);
        assert_eq!(reading.timestamp, Some(12.5));
        assert_eq!(reading.value, json!("abc"));
    }

    #[test]
    fn descriptor_infers_dtype() {
        assert_eq!(
            Descriptor::for_value("SIM:x", &json!(1.5)).dtype.as_deref(),
            Some("number")
        );
        assert_eq!(
            Descriptor::for_value("SIM:x", &json!(3)).dtype.as_deref(),
            Some("integer")
        );
        assert_eq!(
            Descriptor::for_value("SIM:x", &json!("on")).dtype.as_deref(),
            Some("string")
        );
    }

    #[test]
    fn shape_of_nested_arrays() {
        assert_eq!(shape_of(&json!(1)), Vec::<usize>::new());
        assert_eq!(shape_of(&json!([1, 2, 3])), vec![3]);
        assert_eq!(shape_of(&json!([[1, 2], [3, 4], [5, 6]])), vec![3, 2]);
        assert_eq!(shape_of(&json!([])), vec![0]);
    }

    proptest::proptest! {
        #[test]
        fn prop_shape_of_rectangular_arrays(rows in 1usize..6, cols in 0usize..6) {
            let value = Value::Array(vec![Value::Array(vec![json!(0.0); cols]); rows]);
            proptest::prop_assert_eq!(shape_of(&value), vec![rows, cols]);
            proptest::prop_assert_eq!(dtype_of(&value), "array");
        }
    }

    #[test]
    fn descriptor_round_trips_source() {
        let desc = Descriptor::new("PV:motor").with_dtype("number");
        let decoded: Descriptor =
            serde_json::from_value(serde_json::to_value(&desc).unwrap()).unwrap();
        assert_eq!(decoded, desc);
    }
}
