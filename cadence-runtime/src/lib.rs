//! Polling runtime
//!
//! Ties the pin drivers to a polling loop driven by user logic:
//!
//! - [`Engine`]: owns the polling thread and the key buffer
//! - [`Registry`]: pins unique by physical id, looked up by id or name
//! - [`KeyTable`]: latest key states and this cycle's edges
//! - [`Cycle`]: what a [`Controller`] sees each iteration
//! - [`Observer`]: state change and fault notifications
//! - [`config`]: TOML configuration and registry population
//!
//! Diagnostics are emitted through `tracing`; the host binary decides
//! where they go by installing a subscriber.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadence_core::{BoxError, Key, KeyState};
//! use cadence_hal::SimBus;
//! use cadence_runtime::{Cycle, Engine};
//!
//! let bus = Arc::new(SimBus::new());
//! let mut engine = Engine::new(bus, |cycle: &mut Cycle<'_>| -> Result<(), BoxError> {
//!     if cycle.key_just_changed_to('L', KeyState::Active) {
//!         cycle.toggle("lamp");
//!     }
//!     Ok(())
//! });
//! engine.start()?;
//! engine.invoke(Key::active('L'));
//! # Ok::<(), cadence_core::Fault>(())
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod cycle;
pub mod engine;
pub mod keys;
pub mod observer;
pub mod registry;

pub use config::ConfigError;
pub use cycle::Cycle;
pub use engine::{Controller, Engine, Invoker};
pub use keys::KeyTable;
pub use observer::{ChannelObserver, EngineEvent, Observer, Observers, PinSnapshot};
pub use registry::{LookupError, PinKey, Registry};
