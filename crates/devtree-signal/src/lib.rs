//! devtree Signal Contract
//!
//! The leaf side of a device tree.
//!
//! # Overview
//!
//! - **Signal**: one value plus its metadata and configuration snapshot
//! - **SignalType**: how a component constructs a leaf from its arguments
//! - **Reading / Descriptor**: the records every aggregation emits
//! - **SoftSignal**: an in-memory leaf
//!
//! # Example
//!
//! ```rust
//! use devtree_signal::{Signal, SoftSignal};
//! use serde_json::json;
//!
//! let mut sig = SoftSignal::new("motor_velocity", 1.0);
//! sig.put(json!(2.5)).unwrap();
//!
//! let read = sig.read().unwrap();
//! assert_eq!(read["motor_velocity"].value, json!(2.5));
//! assert!(sig.read_configuration().unwrap().contains_key("motor_velocity_conf"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod signal;
mod soft;
mod value;

// Re-exports
pub use signal::{
    conf_key, InstanceId, ParentRef, Signal, SignalArgs, SignalError, SignalType, CONF_SUFFIX,
};
pub use soft::SoftSignal;
pub use value::{dtype_of, shape_of, Descriptor, DescriptorMap, Kwargs, Reading, ReadingMap, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
