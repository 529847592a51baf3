//! Pin driver implementations
//!
//! This crate provides the concrete polled and driven entities held by
//! the runtime's registry:
//!
//! - [`DigitalPin`]: bidirectional digital pin (also an `embedded-hal`
//!   digital pin)
//! - [`SoftPwmPin`]: bit-banged PWM with its own drive thread
//! - [`PwmPin`]: PWM delegated to the bus' soft-PWM primitive
//!
//! All of them implement [`PinDriver`] and are stored in the registry as
//! the closed [`Pin`] enum.

#![deny(unsafe_code)]

pub mod digital;
pub mod driver;
pub mod pin;
pub mod pwm;
pub mod soft_pwm;

pub use digital::DigitalPin;
pub use driver::{PinDriver, PinError, SharedBus};
pub use pin::{Pin, PinVariant};
pub use pwm::PwmPin;
pub use soft_pwm::SoftPwmPin;
