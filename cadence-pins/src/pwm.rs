//! Hardware soft-PWM pin
//!
//! PWM delegated to the bus' `create_pwm`/`write_pwm` primitive. The bus
//! drives the waveform continuously, so the pin is never polled.

use cadence_core::{Edge, HardwareItem, Label};
use cadence_hal::{PinId, PinMode};

use crate::driver::{PinDriver, PinError, SharedBus};

/// PWM output driven by the bus
pub struct PwmPin {
    item: HardwareItem,
    bus: SharedBus,
    id: PinId,
    /// Duty written when switched on
    value: i32,
    range: i32,
    duty: i32,
    pollable: bool,
    released: bool,
}

impl PwmPin {
    /// Create the PWM channel at duty `value` out of `range`
    pub fn new(
        bus: SharedBus,
        id: impl Into<PinId>,
        value: i32,
        range: i32,
    ) -> Result<Self, PinError> {
        if range <= 0 {
            return Err(PinError::InvalidRange);
        }
        let value = value.clamp(0, range);
        let id = id.into();
        bus.set_mode(id, PinMode::PwmOutput)?;
        bus.create_pwm(id, value, range)?;

        Ok(Self {
            item: HardwareItem::new(),
            bus,
            id,
            value,
            range,
            duty: value,
            pollable: false,
            released: false,
        })
    }

    /// Attach a friendly name
    pub fn with_label(mut self, name: Label) -> Self {
        self.item.set_label(name);
        self
    }

    /// Configured duty value (the level used by `write(true)`)
    pub fn read_duty(&self) -> i32 {
        self.value
    }

    /// Duty currently on the bus
    pub fn duty(&self) -> i32 {
        self.duty
    }

    /// Duty resolution
    pub fn range(&self) -> i32 {
        self.range
    }

    /// Change the duty used by `write(true)`; the bus is not touched
    pub fn set_value(&mut self, value: i32) {
        self.value = value.clamp(0, self.range);
    }

    /// Write a raw duty, clamped to `0..=range`
    pub fn write_duty(&mut self, duty: i32) -> Result<(), PinError> {
        if self.item.is_hardware_locked() {
            return Err(PinError::Locked);
        }
        let duty = duty.clamp(0, self.range);
        self.bus.write_pwm(self.id, duty)?;
        self.duty = duty;
        self.item.set_just_changed(true);
        Ok(())
    }
}

impl PinDriver for PwmPin {
    fn kind(&self) -> &'static str {
        "PwmPin"
    }

    fn physical_id(&self) -> PinId {
        self.id
    }

    fn item(&self) -> &HardwareItem {
        &self.item
    }

    fn item_mut(&mut self) -> &mut HardwareItem {
        &mut self.item
    }

    fn state(&self) -> bool {
        self.duty > 0
    }

    fn is_pollable(&self) -> bool {
        self.pollable
    }

    fn set_pollable(&mut self, pollable: bool) {
        self.pollable = pollable;
    }

    fn is_output(&self) -> bool {
        true
    }

    fn poll(&mut self) -> Result<Option<Edge>, PinError> {
        Ok(None)
    }

    fn read(&self) -> Result<bool, PinError> {
        Ok(self.state())
    }

    /// Switch between the configured duty and off
    fn write(&mut self, high: bool) -> Result<(), PinError> {
        let duty = if high { self.value } else { 0 };
        self.write_duty(duty)
    }

    fn dispose(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.bus.write_pwm(self.id, 0);
        self.duty = 0;
        let _ = self.bus.release(self.id);
    }

    fn is_disposed(&self) -> bool {
        self.released
    }

    fn reclaim(&mut self) -> Result<(), PinError> {
        if self.released {
            return Ok(());
        }
        self.bus.set_mode(self.id, PinMode::PwmOutput)?;
        self.bus.create_pwm(self.id, self.duty, self.range)?;
        Ok(())
    }
}

impl Drop for PwmPin {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl core::fmt::Debug for PwmPin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PwmPin")
            .field("id", &self.id)
            .field("name", &self.item.friendly_name())
            .field("value", &self.value)
            .field("range", &self.range)
            .field("duty", &self.duty)
            .finish()
    }
}
