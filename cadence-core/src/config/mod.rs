//! Configuration types
//!
//! Board-agnostic runtime configuration, deserialized from TOML by the
//! runtime crate.

pub mod types;

pub use types::*;
