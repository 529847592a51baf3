//! TOML configuration loader
//!
//! ```toml
//! [engine]
//! stop_timeout_ms = 250
//! setup_policy = "degraded"
//!
//! [[pin]]
//! id = 17
//! name = "lamp"
//! direction = "output"
//!
//! [[pin]]
//! id = 4
//! pull = "up"
//!
//! [[soft_pwm]]
//! id = 18
//! frequency = 50.0
//! width = 0.075
//! autostart = true
//! ```

use core::fmt;
use std::collections::BTreeSet;
use std::path::Path;

use cadence_core::config::RuntimeConfig;
use cadence_core::item::label;
use cadence_core::{Label, NameGenerator, MAX_LABEL_LEN};
use cadence_hal::PinId;
use cadence_pins::{DigitalPin, PinError, PwmPin, SharedBus, SoftPwmPin};
use tracing::{debug, info, warn};

use crate::registry::Registry;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Reading the file failed
    Io(std::io::ErrorKind),
    /// TOML syntax or schema error
    Parse(String),
    /// A friendly name does not fit a label
    NameTooLong,
    /// Two entries claim the same physical pin
    DuplicatePin(PinId),
    /// A pin could not be configured on the bus
    Pin(PinId, PinError),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.kind())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.message().to_string())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(kind) => write!(f, "config read failed: {}", kind),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::NameTooLong => {
                write!(f, "pin name longer than {} bytes", MAX_LABEL_LEN)
            }
            ConfigError::DuplicatePin(id) => write!(f, "{} configured twice", id),
            ConfigError::Pin(id, e) => write!(f, "{}: {}", id, e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate a TOML document
pub fn from_str(text: &str) -> Result<RuntimeConfig, ConfigError> {
    let config: RuntimeConfig = toml::from_str(text).map_err(|e| {
        warn!("TOML parse error: {}", e);
        ConfigError::from(e)
    })?;
    validate(&config)?;
    log_config_summary(&config);
    Ok(config)
}

/// Read, parse and validate a TOML file
pub fn load(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    from_str(&text)
}

/// Check physical ids are unique and names fit a label
pub fn validate(config: &RuntimeConfig) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for id in config.pin_ids() {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicatePin(id));
        }
    }

    let names = config
        .pins
        .iter()
        .map(|p| &p.name)
        .chain(config.soft_pwm.iter().map(|p| &p.name))
        .chain(config.pwm.iter().map(|p| &p.name));
    for name in names.flatten() {
        checked_label(name)?;
    }
    Ok(())
}

fn checked_label(name: &str) -> Result<Label, ConfigError> {
    label(name).ok_or(ConfigError::NameTooLong)
}

fn named<T>(pin: T, name: &Option<String>, with_label: fn(T, Label) -> T) -> Result<T, ConfigError> {
    match name {
        Some(name) => Ok(with_label(pin, checked_label(name)?)),
        None => Ok(pin),
    }
}

fn log_config_summary(config: &RuntimeConfig) {
    info!(
        "Config: {} pins, {} soft PWM, {} PWM",
        config.pins.len(),
        config.soft_pwm.len(),
        config.pwm.len()
    );
    debug!(
        "Engine: stop timeout {} ms, min cycle {} us",
        config.engine.stop_timeout_ms,
        config.engine.min_cycle_us
    );
}

impl Registry {
    /// Registry holding every configured pin
    ///
    /// Unnamed pins are named by `names`.
    pub fn from_config(
        bus: SharedBus,
        config: &RuntimeConfig,
        names: Box<dyn NameGenerator>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Registry::with_names(bus, names);
        registry.populate(config)?;
        Ok(registry)
    }

    /// Construct and register every configured pin
    ///
    /// Stops at the first pin the bus rejects; pins registered before it
    /// stay registered.
    pub fn populate(&mut self, config: &RuntimeConfig) -> Result<(), ConfigError> {
        validate(config)?;
        let bus = self.bus().clone();

        for cfg in &config.pins {
            let pin = DigitalPin::with_pull(bus.clone(), cfg.id, cfg.direction, cfg.initial, cfg.pull)
                .map_err(|e| ConfigError::Pin(cfg.id, e))?;
            let pin = named(pin, &cfg.name, DigitalPin::with_label)?;
            self.add_with(pin, cfg.pollable);
        }

        for cfg in &config.soft_pwm {
            let pin = SoftPwmPin::new(bus.clone(), cfg.id, cfg.frequency, cfg.width, cfg.initial)
                .map_err(|e| ConfigError::Pin(cfg.id, e))?;
            let mut pin = named(pin, &cfg.name, SoftPwmPin::with_label)?;
            if cfg.autostart {
                pin.start().map_err(|e| ConfigError::Pin(cfg.id, e))?;
            }
            self.add_with(pin, false);
        }

        for cfg in &config.pwm {
            let pin = PwmPin::new(bus.clone(), cfg.id, cfg.value, cfg.range)
                .map_err(|e| ConfigError::Pin(cfg.id, e))?;
            let pin = named(pin, &cfg.name, PwmPin::with_label)?;
            self.add_with(pin, false);
        }

        debug!("Registered {} configured pins", self.len());
        Ok(())
    }
}
