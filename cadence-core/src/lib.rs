//! Board-agnostic core of the Cadence polling runtime
//!
//! This crate contains everything the engine needs that does not touch
//! hardware:
//!
//! - The write buffer that hands events from caller threads to the engine
//! - The hardware item record (friendly name, edge flag, lockout latch)
//! - Logical input keys
//! - Friendly-name generators
//! - The fault taxonomy reported to observers
//! - The engine lifecycle state machine
//! - Configuration type definitions

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod fault;
pub mod item;
pub mod key;
pub mod naming;
pub mod state;

pub use buffer::WriteBuffer;
pub use fault::{BoxError, Fault, FaultKind};
pub use item::{Direction, Edge, HardwareItem, Label, MAX_LABEL_LEN};
pub use key::{Key, KeyId, KeyState};
pub use naming::{NameGenerator, RandomSuffix, Sequential};
pub use state::{EngineState, Lifecycle};
