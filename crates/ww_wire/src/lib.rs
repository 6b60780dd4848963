#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// alloc paths

// Collections and strings are imported through `alloc` so the split between
// allocation and OS concerns stays visible, matching the workspace lints.
extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod error;
pub mod hash_wire;
pub mod history;
pub mod marshal;
pub mod registry;
pub mod token;
pub mod value;

// -----------------------------------------------------------------------------
// Top-level exports

pub use error::{WireError, WireResult};
pub use marshal::{FieldKind, FieldValue, Marshallable, from_yaml_str, to_yaml_string};
pub use value::{ValueIn, ValueOut, YamlIn, YamlOut};
