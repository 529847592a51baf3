//! Pin driver trait
//!
//! The interface the engine uses to poll, drive and dispose any pin
//! variant, plus the error type shared by all of them.

use core::fmt;
use std::sync::Arc;

use cadence_core::{Edge, HardwareItem};
use cadence_hal::{BusError, GpioBus, PinId};

/// Bus handle shared by the engine thread and PWM drive threads
pub type SharedBus = Arc<dyn GpioBus>;

/// Errors from pin operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    /// The bus rejected the operation
    Bus(BusError),
    /// The pin's hardware lockout is engaged
    Locked,
    /// The pin is owned by its PWM drive thread
    Driven,
    /// PWM frequency must be positive and finite
    InvalidFrequency,
    /// PWM width must be within 0.0-1.0
    InvalidWidth,
    /// PWM range must be positive
    InvalidRange,
    /// The PWM drive thread could not be spawned
    Spawn,
}

impl From<BusError> for PinError {
    fn from(e: BusError) -> Self {
        PinError::Bus(e)
    }
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::Bus(e) => write!(f, "bus error: {}", e),
            PinError::Locked => f.write_str("pin hardware lockout is engaged"),
            PinError::Driven => f.write_str("pin is driven by its PWM thread"),
            PinError::InvalidFrequency => f.write_str("PWM frequency must be positive"),
            PinError::InvalidWidth => f.write_str("PWM width must be within 0.0-1.0"),
            PinError::InvalidRange => f.write_str("PWM range must be positive"),
            PinError::Spawn => f.write_str("could not spawn PWM drive thread"),
        }
    }
}

impl std::error::Error for PinError {}

impl embedded_hal::digital::Error for PinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// Common interface of every registered pin
///
/// `state` is the cached level; only [`PinDriver::poll`] and writes
/// change it. Writes always raise the edge flag, even when they repeat
/// the current level.
pub trait PinDriver {
    /// Variant name, used for generated friendly names and diagnostics
    fn kind(&self) -> &'static str;

    /// Physical pin owned by this driver
    fn physical_id(&self) -> PinId;

    /// Shared item record
    fn item(&self) -> &HardwareItem;

    /// Mutable item record
    fn item_mut(&mut self) -> &mut HardwareItem;

    /// Cached level (true = high)
    fn state(&self) -> bool;

    /// Check if the engine re-reads this pin every cycle
    fn is_pollable(&self) -> bool;

    /// Enable or disable per-cycle polling
    fn set_pollable(&mut self, pollable: bool);

    /// Check if writes reach the hardware
    fn is_output(&self) -> bool;

    /// Re-sample the hardware and update the edge flag
    fn poll(&mut self) -> Result<Option<Edge>, PinError>;

    /// Current level
    fn read(&self) -> Result<bool, PinError>;

    /// Drive the pin
    fn write(&mut self, high: bool) -> Result<(), PinError>;

    /// Invert the cached level
    fn toggle(&mut self) -> Result<(), PinError> {
        let next = !self.state();
        self.write(next)
    }

    /// Drive outputs low and release the bus pin
    ///
    /// Runs at most once; later calls are no-ops. Never fails.
    fn dispose(&mut self);

    /// Check if the pin has been released
    fn is_disposed(&self) -> bool;

    /// Re-apply mode and cached level to the bus
    ///
    /// Needed after another driver on the same physical pin was disposed
    /// and released it. Disposed pins are left alone.
    fn reclaim(&mut self) -> Result<(), PinError>;

    /// Edge flag for the current cycle
    fn just_changed(&self) -> bool {
        self.item().just_changed()
    }

    /// Check if the pin changed to `high` this cycle
    fn just_changed_to(&self, high: bool) -> bool {
        self.state() == high && self.just_changed()
    }

    /// Friendly name, if assigned
    fn friendly_name(&self) -> Option<&str> {
        self.item().friendly_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_conversion() {
        let err: PinError = BusError::Io.into();
        assert_eq!(err, PinError::Bus(BusError::Io));
        assert_eq!(err.to_string(), "bus error: gpio register access failed");
    }

    #[test]
    fn test_range_error_display() {
        assert_eq!(PinError::InvalidRange.to_string(), "PWM range must be positive");
        assert_ne!(PinError::InvalidRange, PinError::InvalidWidth);
    }

    #[test]
    fn test_embedded_hal_kind() {
        use embedded_hal::digital::Error;
        assert_eq!(
            PinError::Locked.kind(),
            embedded_hal::digital::ErrorKind::Other
        );
    }
}
