//! Configuration type definitions
//!
//! A [`RuntimeConfig`] describes the engine settings and the pins to
//! register at setup. Every field except the pin identifiers has a
//! default, so a minimal file only lists pins.

use cadence_hal::{PinId, PullMode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::item::Direction;

/// Default bounded join for the polling thread on stop
pub const DEFAULT_STOP_TIMEOUT_MS: u32 = 500;

/// What to do when bus initialization fails at start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum SetupPolicy {
    /// Report the fault and leave the engine stopped
    #[default]
    Abort,
    /// Report the fault and start the polling loop anyway
    Degraded,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct EngineSettings {
    /// Bounded join for the polling thread on stop (ms)
    pub stop_timeout_ms: u32,
    /// Reaction to a failed bus init
    pub setup_policy: SetupPolicy,
    /// Minimum cycle period in µs (0 = tight poll)
    pub min_cycle_us: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            setup_policy: SetupPolicy::Abort,
            min_cycle_us: 0,
        }
    }
}

/// Digital pin configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// Physical pin
    pub id: PinId,
    /// Friendly name (generated if absent)
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Pin direction
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: Direction,
    /// Level written at construction (outputs only)
    #[cfg_attr(feature = "serde", serde(default))]
    pub initial: bool,
    /// Re-read every engine cycle
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub pollable: bool,
    /// Internal resistor (inputs only)
    #[cfg_attr(feature = "serde", serde(default))]
    pub pull: PullMode,
}

impl PinConfig {
    /// Input pin with polling enabled
    pub fn input(id: impl Into<PinId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            direction: Direction::Input,
            initial: false,
            pollable: true,
            pull: PullMode::Off,
        }
    }

    /// Output pin with the given initial level
    pub fn output(id: impl Into<PinId>, initial: bool) -> Self {
        Self {
            direction: Direction::Output,
            initial,
            ..Self::input(id)
        }
    }
}

/// Bit-banged PWM pin configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SoftPwmConfig {
    /// Physical pin
    pub id: PinId,
    /// Friendly name (generated if absent)
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Pulse frequency in Hz
    pub frequency: f32,
    /// On fraction of each period (0.0-1.0)
    pub width: f32,
    /// Level restored when the drive thread stops
    #[cfg_attr(feature = "serde", serde(default))]
    pub initial: bool,
    /// Start the drive thread at setup
    #[cfg_attr(feature = "serde", serde(default))]
    pub autostart: bool,
}

/// Hardware soft-PWM pin configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PwmConfig {
    /// Physical pin
    pub id: PinId,
    /// Friendly name (generated if absent)
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Duty written when the pin is switched on
    pub value: i32,
    /// Duty resolution
    pub range: i32,
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RuntimeConfig {
    /// Engine settings
    pub engine: EngineSettings,
    /// Digital pins
    #[cfg_attr(feature = "serde", serde(rename = "pin"))]
    pub pins: Vec<PinConfig>,
    /// Bit-banged PWM pins
    pub soft_pwm: Vec<SoftPwmConfig>,
    /// Hardware soft-PWM pins
    pub pwm: Vec<PwmConfig>,
}

impl RuntimeConfig {
    /// Every configured physical pin, in declaration order
    pub fn pin_ids(&self) -> impl Iterator<Item = PinId> + '_ {
        self.pins
            .iter()
            .map(|p| p.id)
            .chain(self.soft_pwm.iter().map(|p| p.id))
            .chain(self.pwm.iter().map(|p| p.id))
    }
}

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.stop_timeout_ms, DEFAULT_STOP_TIMEOUT_MS);
        assert_eq!(settings.setup_policy, SetupPolicy::Abort);
        assert_eq!(settings.min_cycle_us, 0);
    }

    #[test]
    fn test_pin_constructors() {
        let input = PinConfig::input(4);
        assert_eq!(input.direction, Direction::Input);
        assert!(input.pollable);

        let output = PinConfig::output(17, true);
        assert_eq!(output.id, PinId(17));
        assert_eq!(output.direction, Direction::Output);
        assert!(output.initial);
    }

    #[test]
    fn test_pin_ids_order() {
        let config = RuntimeConfig {
            pins: vec![PinConfig::input(4), PinConfig::output(17, false)],
            pwm: vec![PwmConfig {
                id: PinId(12),
                name: None,
                value: 50,
                range: 100,
            }],
            ..RuntimeConfig::default()
        };
        let ids: Vec<_> = config.pin_ids().collect();
        assert_eq!(ids, vec![PinId(4), PinId(17), PinId(12)]);
    }
}
