//! devtree Components
//!
//! Type-level side of a device tree: what a device type declares.
//!
//! # Overview
//!
//! - **Component**: binds an attribute name to a child type and its arguments
//! - **Template**: a suffix computed from the owner at first access
//! - **DeviceType**: the registered, validated roster of a device type
//! - **AttrPath**: dotted path through nested devices
//!
//! # Example
//!
//! ```rust
//! use devtree_component::{Component, DeviceType};
//! use devtree_signal::SoftSignal;
//!
//! let sub = DeviceType::builder("SubDevice")
//!     .component("cpt1", Component::signal::<SoftSignal>("1"))
//!     .component("cpt2", Component::signal::<SoftSignal>("2"))
//!     .build()
//!     .unwrap();
//!
//! let dev = DeviceType::builder("MyDevice")
//!     .component("sub_cpt1", Component::device(&sub, "SUB1:").with_config_default(true))
//!     .component("cpt3", Component::signal::<SoftSignal>("3"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(dev.signal_names().collect::<Vec<_>>(), vec!["sub_cpt1", "cpt3"]);
//! assert_eq!(dev.default_configuration_attrs(), vec!["sub_cpt1"]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod component;
mod device_type;
mod path;
mod template;

// Re-exports
pub use component::{Component, ComponentKind, SignalFactory, Suffix};
pub use device_type::{is_reserved, DefinitionError, DeviceType, DeviceTypeBuilder, RESERVED_NAMES};
pub use path::{is_identifier, AttrPath, PathError};
pub use template::{Owner, Template, TemplateError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
