//! In-memory GPIO bus
//!
//! Records every configuration call and write so tests can assert on the
//! exact hardware traffic. Input levels are set by the test through
//! [`SimBus::set_level`]; faults are injected per pin.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::gpio::{BusError, GpioBus, PinId, PinMode, PullMode};

/// Recorded state of one simulated pin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimPin {
    /// Last configured mode
    pub mode: Option<PinMode>,
    /// Last configured pull
    pub pull: PullMode,
    /// Current level (driven or externally set)
    pub level: bool,
    /// Soft-PWM (duty, range), if created
    pub pwm: Option<(i32, i32)>,
    /// Number of `write(pin, true)` calls
    pub high_writes: u32,
    /// Number of `write(pin, false)` calls
    pub low_writes: u32,
    /// Number of `release` calls
    pub releases: u32,
}

impl SimPin {
    /// Total digital writes seen by this pin
    pub fn writes(&self) -> u32 {
        self.high_writes + self.low_writes
    }
}

#[derive(Debug, Default)]
struct SimState {
    init_calls: u32,
    fail_init: bool,
    pins: BTreeMap<PinId, SimPin>,
    failing: BTreeSet<PinId>,
}

/// Simulated GPIO bus
#[derive(Debug, Default)]
pub struct SimBus {
    state: Mutex<SimState>,
}

impl SimBus {
    /// Create a bus with every pin low and unconfigured
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus whose `init` always fails
    pub fn failing_init() -> Self {
        let bus = Self::default();
        bus.lock().fail_init = true;
        bus
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not hide the recorded traffic
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the level seen by `read` (simulates external hardware)
    pub fn set_level(&self, pin: PinId, high: bool) {
        self.lock().pins.entry(pin).or_default().level = high;
    }

    /// Current level of a pin (false if never touched)
    pub fn level(&self, pin: PinId) -> bool {
        self.lock().pins.get(&pin).map(|p| p.level).unwrap_or(false)
    }

    /// Snapshot of a pin's recorded state
    pub fn pin(&self, pin: PinId) -> Option<SimPin> {
        self.lock().pins.get(&pin).cloned()
    }

    /// Number of `release` calls for a pin
    pub fn releases(&self, pin: PinId) -> u32 {
        self.lock().pins.get(&pin).map(|p| p.releases).unwrap_or(0)
    }

    /// Number of `init` calls
    pub fn init_calls(&self) -> u32 {
        self.lock().init_calls
    }

    /// Make every subsequent access to `pin` fail with [`BusError::Io`]
    pub fn fail_pin(&self, pin: PinId) {
        self.lock().failing.insert(pin);
    }

    /// Undo [`SimBus::fail_pin`]
    pub fn heal_pin(&self, pin: PinId) {
        self.lock().failing.remove(&pin);
    }

    fn with_pin<R>(
        &self,
        pin: PinId,
        f: impl FnOnce(&mut SimPin) -> R,
    ) -> Result<R, BusError> {
        let mut state = self.lock();
        if state.init_calls == 0 || state.fail_init {
            return Err(BusError::Unavailable);
        }
        if state.failing.contains(&pin) {
            return Err(BusError::Io);
        }
        Ok(f(state.pins.entry(pin).or_default()))
    }
}

impl GpioBus for SimBus {
    fn init(&self) -> Result<(), BusError> {
        let mut state = self.lock();
        state.init_calls += 1;
        if state.fail_init {
            return Err(BusError::Unavailable);
        }
        Ok(())
    }

    fn set_mode(&self, pin: PinId, mode: PinMode) -> Result<(), BusError> {
        self.with_pin(pin, |p| p.mode = Some(mode))
    }

    fn set_pull(&self, pin: PinId, pull: PullMode) -> Result<(), BusError> {
        self.with_pin(pin, |p| p.pull = pull)
    }

    fn read(&self, pin: PinId) -> Result<bool, BusError> {
        self.with_pin(pin, |p| p.level)
    }

    fn write(&self, pin: PinId, high: bool) -> Result<(), BusError> {
        self.with_pin(pin, |p| {
            p.level = high;
            if high {
                p.high_writes += 1;
            } else {
                p.low_writes += 1;
            }
        })
    }

    fn create_pwm(&self, pin: PinId, value: i32, range: i32) -> Result<(), BusError> {
        self.with_pin(pin, |p| {
            p.pwm = Some((value, range));
            p.level = value > 0;
        })
    }

    fn write_pwm(&self, pin: PinId, value: i32) -> Result<(), BusError> {
        let result = self.with_pin(pin, |p| match p.pwm.as_mut() {
            Some((duty, _)) => {
                *duty = value;
                p.level = value > 0;
                true
            }
            None => false,
        })?;
        if result {
            Ok(())
        } else {
            Err(BusError::Unsupported)
        }
    }

    fn release(&self, pin: PinId) -> Result<(), BusError> {
        // Release is bookkeeping only; it must succeed on a failing pin so
        // tests can count it.
        let mut state = self.lock();
        let p = state.pins.entry(pin).or_default();
        p.releases += 1;
        p.mode = None;
        Ok(())
    }
}
