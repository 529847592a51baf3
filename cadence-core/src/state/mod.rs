//! Engine lifecycle
//!
//! The engine is either stopped or running a polling thread. The state
//! machine is explicit so lifecycle calls can be idempotent: starting a
//! running engine and stopping a stopped one are both no-ops.

pub mod machine;

pub use machine::{EngineState, Lifecycle};
