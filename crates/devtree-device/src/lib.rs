//! devtree Devices
//!
//! Instance side of a device tree.
//!
//! # Overview
//!
//! - **Device**: a node built from a registered `DeviceType`, owning lazily
//!   constructed children
//! - **Attribute sets**: read, configuration and monitor subsets of the roster
//! - **Aggregation**: `read`, `describe`, `read_configuration`,
//!   `describe_configuration`
//! - **Lifecycle**: `stage`, `unstage`, `configure`
//!
//! # Example
//!
//! ```rust
//! use devtree_component::{Component, DeviceType};
//! use devtree_device::Device;
//! use devtree_signal::SoftSignal;
//!
//! let sub = DeviceType::builder("SubDevice")
//!     .component("cpt1", Component::signal::<SoftSignal>("1").with_config_default(true))
//!     .component("cpt2", Component::signal::<SoftSignal>("2"))
//!     .build()
//!     .unwrap();
//! let top = DeviceType::builder("MyDevice")
//!     .component("sub_cpt1", Component::device(&sub, "S1:"))
//!     .component("sub_cpt2", Component::device(&sub, "S2:"))
//!     .build()
//!     .unwrap();
//!
//! let mut dev = Device::builder(&top, "XF:").name("dev").build().unwrap();
//! dev.set_configuration_attrs(["sub_cpt1", "sub_cpt2.cpt2"]).unwrap();
//!
//! let keys: Vec<String> = dev.describe_configuration().unwrap().into_keys().collect();
//! assert_eq!(keys, vec!["dev_sub_cpt1_cpt1_conf", "dev_sub_cpt2_cpt2_conf"]);
//!
//! let staged = dev.stage().unwrap();
//! assert_eq!(staged[0], "dev");
//! dev.unstage().unwrap();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod aggregate;
mod attrs;
mod config;
mod device;
mod error;
mod lifecycle;

// Re-exports
pub use attrs::AttrSet;
pub use config::{ConfigError, DeviceConfig, DuplicateKeyPolicy};
pub use device::{Child, Device, DeviceBuilder};
pub use error::{AggregationError, ConstructionError, DeviceError, StageError, ValidationError};
pub use lifecycle::StageState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
