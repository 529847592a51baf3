//! GPIO bus capability
//!
//! One bus handle is shared by the engine thread and every PWM drive
//! thread, so all methods take `&self` and implementations must be
//! `Send + Sync`.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Physical pin identifier (BCM numbering on Raspberry Pi class boards)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct PinId(pub u8);

impl PinId {
    /// Create a pin identifier
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    /// Raw pin number
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl From<u8> for PinId {
    fn from(number: u8) -> Self {
        Self(number)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Electrical mode of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Digital input
    Input,
    /// Digital push-pull output
    Output,
    /// Output driven by the bus' soft-PWM primitive
    PwmOutput,
}

/// Internal resistor configuration for input pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum PullMode {
    /// No internal resistor
    #[default]
    Off,
    /// Pull-down to ground
    Down,
    /// Pull-up to supply
    Up,
}

/// Errors reported by a bus implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Bus not initialized or register mapping unavailable
    Unavailable,
    /// Pin number not present on this board
    InvalidPin(PinId),
    /// Register access failed
    Io,
    /// Operation not supported by this bus
    Unsupported,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Unavailable => f.write_str("gpio bus unavailable"),
            BusError::InvalidPin(pin) => write!(f, "{} does not exist on this bus", pin),
            BusError::Io => f.write_str("gpio register access failed"),
            BusError::Unsupported => f.write_str("operation not supported by this bus"),
        }
    }
}

impl core::error::Error for BusError {}

/// GPIO bus capability
///
/// Implementations should handle the actual register manipulation for
/// the specific board. Every call is expected to complete in well under
/// a microsecond; none of them may block on other bus users for longer
/// than an internal lock.
pub trait GpioBus: Send + Sync {
    /// One-time bus initialization (register mapping, permissions)
    fn init(&self) -> Result<(), BusError>;

    /// Configure the electrical mode of a pin
    fn set_mode(&self, pin: PinId, mode: PinMode) -> Result<(), BusError>;

    /// Configure the internal resistor of an input pin
    fn set_pull(&self, pin: PinId, pull: PullMode) -> Result<(), BusError>;

    /// Sample the level of a pin (true = high)
    fn read(&self, pin: PinId) -> Result<bool, BusError>;

    /// Drive an output pin (true = high)
    fn write(&self, pin: PinId, high: bool) -> Result<(), BusError>;

    /// Attach the bus' soft-PWM primitive to a pin
    ///
    /// `value` is the initial duty, `range` the duty resolution.
    fn create_pwm(&self, pin: PinId, value: i32, range: i32) -> Result<(), BusError> {
        let _ = (pin, value, range);
        Err(BusError::Unsupported)
    }

    /// Update the duty of a pin created with [`GpioBus::create_pwm`]
    fn write_pwm(&self, pin: PinId, value: i32) -> Result<(), BusError> {
        let _ = (pin, value);
        Err(BusError::Unsupported)
    }

    /// Hand a pin back to the bus
    ///
    /// Called exactly once per pin owner on disposal.
    fn release(&self, pin: PinId) -> Result<(), BusError> {
        let _ = pin;
        Ok(())
    }
}
