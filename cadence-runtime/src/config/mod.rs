//! Configuration loading
//!
//! Reads a [`RuntimeConfig`] from TOML and turns it into registered pins.
//! The types themselves live in `cadence_core::config`.

pub mod loader;

pub use cadence_core::config::{
    EngineSettings, PinConfig, PwmConfig, RuntimeConfig, SetupPolicy, SoftPwmConfig,
};
pub use loader::{from_str, load, validate, ConfigError};
