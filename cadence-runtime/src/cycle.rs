//! Per-cycle context
//!
//! A [`Cycle`] is what user logic sees each iteration: the merged key
//! table, the pin registry and a way to report faults. Pin helpers report
//! lookup misses to the observers themselves and answer `false` or
//! `None`, so control code can stay a flat list of conditions.

use cadence_core::{Fault, KeyId, KeyState};
use cadence_pins::{Pin, PinDriver, PinError, PinVariant};
use tracing::warn;

use crate::keys::KeyTable;
use crate::observer::Observers;
use crate::registry::{LookupError, PinKey, Registry};

/// View of the engine handed to user logic
pub struct Cycle<'a> {
    number: u64,
    keys: &'a KeyTable,
    registry: &'a mut Registry,
    observers: &'a Observers,
}

impl<'a> Cycle<'a> {
    pub(crate) fn new(
        number: u64,
        keys: &'a KeyTable,
        registry: &'a mut Registry,
        observers: &'a Observers,
    ) -> Self {
        Self {
            number,
            keys,
            registry,
            observers,
        }
    }

    /// Cycle counter, starting at 1
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Merged key states
    pub fn keys(&self) -> &KeyTable {
        self.keys
    }

    /// Registered pins
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Registered pins, for adding or removing pins at runtime
    pub fn registry_mut(&mut self) -> &mut Registry {
        self.registry
    }

    /// Report a fault to the observers
    pub fn report(&self, fault: Fault) {
        warn!("{}", fault);
        self.observers.fault(&fault);
    }

    fn report_lookup(&self, err: &LookupError) {
        self.report(Fault::lookup(err));
    }

    fn report_write(&self, key: &PinKey, err: PinError) {
        let detail = format!("write to {} failed: {}", key, err);
        match err {
            PinError::Bus(_) => self.report(Fault::bus(detail)),
            _ => self.report(Fault::user_callback(detail)),
        }
    }

    /// Check if key `id` currently has `state`
    pub fn key_is(&self, id: impl Into<KeyId>, state: KeyState) -> bool {
        self.keys.is(id, state)
    }

    /// Check if the key named `name` currently has `state`
    pub fn key_named_is(&self, name: &str, state: KeyState) -> bool {
        self.keys.named_is(name, state)
    }

    /// Check if key `id` changed to `state` this cycle
    pub fn key_just_changed_to(&self, id: impl Into<KeyId>, state: KeyState) -> bool {
        self.keys.just_changed_to(id, state)
    }

    /// Check if the key named `name` changed to `state` this cycle
    pub fn key_named_just_changed_to(&self, name: &str, state: KeyState) -> bool {
        self.keys.named_just_changed_to(name, state)
    }

    /// Check if a pin is at `high`
    pub fn pin_is(&self, key: impl Into<PinKey>, high: bool) -> bool {
        match self.registry.get::<Pin>(key) {
            Ok(pin) => pin.state() == high,
            Err(err) => {
                self.report_lookup(&err);
                false
            }
        }
    }

    /// Check if a pin changed to `high` this cycle
    pub fn pin_just_changed_to(&self, key: impl Into<PinKey>, high: bool) -> bool {
        match self.registry.get::<Pin>(key) {
            Ok(pin) => pin.just_changed_to(high),
            Err(err) => {
                self.report_lookup(&err);
                false
            }
        }
    }

    fn output(&mut self, key: PinKey) -> Result<&mut Pin, LookupError> {
        let pin = self.registry.get_mut::<Pin>(key.clone())?;
        if pin.is_output() {
            Ok(pin)
        } else {
            Err(LookupError::NotOutput(key))
        }
    }

    fn drive(&mut self, key: PinKey, op: impl FnOnce(&mut Pin) -> Result<(), PinError>) -> bool {
        let result = match self.output(key.clone()) {
            Ok(pin) => op(pin),
            Err(err) => {
                self.report_lookup(&err);
                return false;
            }
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                self.report_write(&key, err);
                false
            }
        }
    }

    /// Drive an output pin; returns true if the write happened
    pub fn set_value(&mut self, key: impl Into<PinKey>, high: bool) -> bool {
        self.drive(key.into(), |pin| pin.write(high))
    }

    /// Invert an output pin; returns true if the write happened
    pub fn toggle(&mut self, key: impl Into<PinKey>) -> bool {
        self.drive(key.into(), |pin| pin.toggle())
    }

    /// Typed pin access, reporting misses
    pub fn pin<T: PinVariant>(&mut self, key: impl Into<PinKey>) -> Option<&mut T> {
        let key = key.into();
        if let Err(err) = self.registry.get::<T>(key.clone()) {
            self.report_lookup(&err);
            return None;
        }
        self.registry.get_mut::<T>(key).ok()
    }

    /// Typed pin access without reporting
    pub fn try_pin<T: PinVariant>(&mut self, key: impl Into<PinKey>) -> Result<&mut T, LookupError> {
        self.registry.get_mut::<T>(key)
    }
}
