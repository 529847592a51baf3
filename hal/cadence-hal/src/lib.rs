//! Cadence Hardware Abstraction Layer
//!
//! This crate defines the hardware capability consumed by the runtime: a
//! GPIO bus that can configure, read and drive physical pins. The register
//! driver behind it (memory-mapped GPIO, a kernel character device, a
//! vendor library) is supplied by the application.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  cadence-runtime (engine, registry)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cadence-pins (digital, PWM drivers)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cadence-hal (this crate - GpioBus)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ board driver  │       │    SimBus     │
//! │ (application) │       │ (sim feature) │
//! └───────────────┘       └───────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "sim")]
extern crate std;

pub mod gpio;
#[cfg(feature = "sim")]
pub mod sim;

// Re-export key types at crate root for convenience
pub use gpio::{BusError, GpioBus, PinId, PinMode, PullMode};
#[cfg(feature = "sim")]
pub use sim::{SimBus, SimPin};
