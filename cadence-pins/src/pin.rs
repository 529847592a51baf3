//! Registered pin variants
//!
//! The registry stores every pin as one closed [`Pin`] enum and hands
//! out typed views through [`PinVariant`].

use cadence_core::{Edge, HardwareItem};
use cadence_hal::PinId;

use crate::digital::DigitalPin;
use crate::driver::{PinDriver, PinError};
use crate::pwm::PwmPin;
use crate::soft_pwm::SoftPwmPin;

/// Any registered pin
#[derive(Debug)]
pub enum Pin {
    /// Plain digital input or output
    Digital(DigitalPin),
    /// Bit-banged PWM output
    SoftPwm(SoftPwmPin),
    /// Bus-driven PWM output
    Pwm(PwmPin),
}

impl Pin {
    fn driver(&self) -> &dyn PinDriver {
        match self {
            Pin::Digital(p) => p,
            Pin::SoftPwm(p) => p,
            Pin::Pwm(p) => p,
        }
    }

    fn driver_mut(&mut self) -> &mut dyn PinDriver {
        match self {
            Pin::Digital(p) => p,
            Pin::SoftPwm(p) => p,
            Pin::Pwm(p) => p,
        }
    }

    /// Typed view of this pin
    pub fn view<T: PinVariant>(&self) -> Option<&T> {
        T::view(self)
    }

    /// Typed mutable view of this pin
    pub fn view_mut<T: PinVariant>(&mut self) -> Option<&mut T> {
        T::view_mut(self)
    }
}

impl From<DigitalPin> for Pin {
    fn from(pin: DigitalPin) -> Self {
        Pin::Digital(pin)
    }
}

impl From<SoftPwmPin> for Pin {
    fn from(pin: SoftPwmPin) -> Self {
        Pin::SoftPwm(pin)
    }
}

impl From<PwmPin> for Pin {
    fn from(pin: PwmPin) -> Self {
        Pin::Pwm(pin)
    }
}

impl PinDriver for Pin {
    fn kind(&self) -> &'static str {
        self.driver().kind()
    }

    fn physical_id(&self) -> PinId {
        self.driver().physical_id()
    }

    fn item(&self) -> &HardwareItem {
        self.driver().item()
    }

    fn item_mut(&mut self) -> &mut HardwareItem {
        self.driver_mut().item_mut()
    }

    fn state(&self) -> bool {
        self.driver().state()
    }

    fn is_pollable(&self) -> bool {
        self.driver().is_pollable()
    }

    fn set_pollable(&mut self, pollable: bool) {
        self.driver_mut().set_pollable(pollable)
    }

    fn is_output(&self) -> bool {
        self.driver().is_output()
    }

    fn poll(&mut self) -> Result<Option<Edge>, PinError> {
        self.driver_mut().poll()
    }

    fn read(&self) -> Result<bool, PinError> {
        self.driver().read()
    }

    fn write(&mut self, high: bool) -> Result<(), PinError> {
        self.driver_mut().write(high)
    }

    fn toggle(&mut self) -> Result<(), PinError> {
        self.driver_mut().toggle()
    }

    fn dispose(&mut self) {
        self.driver_mut().dispose()
    }

    fn is_disposed(&self) -> bool {
        self.driver().is_disposed()
    }

    fn reclaim(&mut self) -> Result<(), PinError> {
        self.driver_mut().reclaim()
    }
}

/// A type the registry can hand out from a [`Pin`]
///
/// Views are strict: a [`DigitalPin`] view only matches
/// [`Pin::Digital`], never the PWM variants. Use [`Pin`] itself to view
/// any variant.
pub trait PinVariant: PinDriver + Sized {
    /// Name reported in type-mismatch errors
    const KIND: &'static str;

    /// Shared view, or `None` if the variant differs
    fn view(pin: &Pin) -> Option<&Self>;

    /// Mutable view, or `None` if the variant differs
    fn view_mut(pin: &mut Pin) -> Option<&mut Self>;
}

impl PinVariant for Pin {
    const KIND: &'static str = "Pin";

    fn view(pin: &Pin) -> Option<&Self> {
        Some(pin)
    }

    fn view_mut(pin: &mut Pin) -> Option<&mut Self> {
        Some(pin)
    }
}

macro_rules! impl_variant {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl PinVariant for $ty {
            const KIND: &'static str = $kind;

            fn view(pin: &Pin) -> Option<&Self> {
                match pin {
                    Pin::$variant(p) => Some(p),
                    _ => None,
                }
            }

            fn view_mut(pin: &mut Pin) -> Option<&mut Self> {
                match pin {
                    Pin::$variant(p) => Some(p),
                    _ => None,
                }
            }
        }
    };
}

impl_variant!(DigitalPin, Digital, "DigitalPin");
impl_variant!(SoftPwmPin, SoftPwm, "SoftPwmPin");
impl_variant!(PwmPin, Pwm, "PwmPin");
