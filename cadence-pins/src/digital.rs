//! Digital pin
//!
//! A bidirectional GPIO pin with a fixed direction. Inputs change state
//! only through [`DigitalPin::poll`]; outputs change state only through
//! writes, and every write counts as an edge.

use cadence_core::{Direction, Edge, HardwareItem, Label};
use cadence_hal::{PinId, PinMode, PullMode};

use crate::driver::{PinDriver, PinError, SharedBus};

/// Digital GPIO pin
pub struct DigitalPin {
    item: HardwareItem,
    bus: SharedBus,
    id: PinId,
    direction: Direction,
    pull: PullMode,
    /// Level written at construction, restored by PWM wrappers on stop
    initial: bool,
    state: bool,
    pollable: bool,
    released: bool,
}

impl DigitalPin {
    /// Configure a pin on the bus
    ///
    /// Outputs are driven to `initial` immediately. Inputs start with a
    /// low cached state until the first poll.
    pub fn new(
        bus: SharedBus,
        id: impl Into<PinId>,
        direction: Direction,
        initial: bool,
    ) -> Result<Self, PinError> {
        Self::with_pull(bus, id, direction, initial, PullMode::Off)
    }

    /// Configure a pin with an internal resistor
    ///
    /// The pull is only applied to inputs.
    pub fn with_pull(
        bus: SharedBus,
        id: impl Into<PinId>,
        direction: Direction,
        initial: bool,
        pull: PullMode,
    ) -> Result<Self, PinError> {
        let id = id.into();
        bus.set_mode(id, direction.mode())?;

        let state = match direction {
            Direction::Input => {
                bus.set_pull(id, pull)?;
                false
            }
            Direction::Output => {
                bus.write(id, initial)?;
                initial
            }
        };

        Ok(Self {
            item: HardwareItem::new(),
            bus,
            id,
            direction,
            pull,
            initial,
            state,
            pollable: true,
            released: false,
        })
    }

    /// Input pin without pull resistor
    pub fn input(bus: SharedBus, id: impl Into<PinId>) -> Result<Self, PinError> {
        Self::new(bus, id, Direction::Input, false)
    }

    /// Output pin driven to `initial`
    pub fn output(bus: SharedBus, id: impl Into<PinId>, initial: bool) -> Result<Self, PinError> {
        Self::new(bus, id, Direction::Output, initial)
    }

    /// Attach a friendly name
    pub fn with_label(mut self, name: Label) -> Self {
        self.item.set_label(name);
        self
    }

    /// Configured direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Level the pin was configured with
    pub fn initial(&self) -> bool {
        self.initial
    }

    /// Bus handle owned by this pin
    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// Drive an output
    ///
    /// Inputs ignore writes. On outputs the edge flag is raised even if
    /// the level does not change.
    pub fn write(&mut self, high: bool) -> Result<(), PinError> {
        if self.item.is_hardware_locked() {
            return Err(PinError::Locked);
        }
        if self.direction == Direction::Input {
            return Ok(());
        }
        self.bus.write(self.id, high)?;
        self.state = high;
        self.item.set_just_changed(true);
        Ok(())
    }

    /// Invert the cached level of an output
    pub fn toggle(&mut self) -> Result<(), PinError> {
        self.write(!self.state)
    }

    /// Current level
    ///
    /// Only non-polled inputs sample the bus; everything else answers
    /// from the cached state.
    pub fn read(&self) -> Result<bool, PinError> {
        if !self.pollable && self.direction == Direction::Input {
            return Ok(self.bus.read(self.id)?);
        }
        Ok(self.state)
    }

    /// Re-sample the bus and record the edge, if any
    pub fn poll(&mut self) -> Result<Option<Edge>, PinError> {
        let current = self.bus.read(self.id)?;
        let previous = core::mem::replace(&mut self.state, current);
        Ok(self.item.observe(previous, current))
    }

    /// Drive the bus and cached state without the lockout or edge flag
    pub(crate) fn restore(&mut self, high: bool) -> Result<(), PinError> {
        self.bus.write(self.id, high)?;
        self.state = high;
        Ok(())
    }

    /// Configure the bus pin again from the cached state
    ///
    /// Inputs get their pull back; outputs are driven to the cached
    /// level. Does nothing once disposed.
    pub fn reclaim(&mut self) -> Result<(), PinError> {
        if self.released {
            return Ok(());
        }
        self.bus.set_mode(self.id, self.direction.mode())?;
        match self.direction {
            Direction::Input => self.bus.set_pull(self.id, self.pull)?,
            Direction::Output => self.bus.write(self.id, self.state)?,
        }
        Ok(())
    }

    /// Release the pin, driving outputs low first
    pub fn dispose(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.direction == Direction::Output {
            let _ = self.bus.write(self.id, false);
            self.state = false;
        }
        let _ = self.bus.release(self.id);
    }
}

impl PinDriver for DigitalPin {
    fn kind(&self) -> &'static str {
        "DigitalPin"
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
        self.state
    }

    fn is_pollable(&self) -> bool {
        self.pollable
    }

    fn set_pollable(&mut self, pollable: bool) {
        self.pollable = pollable;
    }

    fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    fn poll(&mut self) -> Result<Option<Edge>, PinError> {
        DigitalPin::poll(self)
    }

    fn read(&self) -> Result<bool, PinError> {
        DigitalPin::read(self)
    }

    fn write(&mut self, high: bool) -> Result<(), PinError> {
        DigitalPin::write(self, high)
    }

    fn toggle(&mut self) -> Result<(), PinError> {
        DigitalPin::toggle(self)
    }

    fn dispose(&mut self) {
        DigitalPin::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        self.released
    }

    fn reclaim(&mut self) -> Result<(), PinError> {
        DigitalPin::reclaim(self)
    }
}

impl Drop for DigitalPin {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl core::fmt::Debug for DigitalPin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DigitalPin")
            .field("id", &self.id)
            .field("name", &self.item.friendly_name())
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("pollable", &self.pollable)
            .finish()
    }
}

impl embedded_hal::digital::ErrorType for DigitalPin {
    type Error = PinError;
}

impl embedded_hal::digital::OutputPin for DigitalPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        DigitalPin::write(self, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        DigitalPin::write(self, true)
    }
}

impl embedded_hal::digital::StatefulOutputPin for DigitalPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.state)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state)
    }
}

impl embedded_hal::digital::InputPin for DigitalPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        DigitalPin::read(self)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        DigitalPin::read(self).map(|high| !high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cadence_core::item::label;
    use cadence_hal::{BusError, GpioBus, SimBus};

    fn bus() -> Arc<SimBus> {
        let bus = Arc::new(SimBus::new());
        cadence_hal::GpioBus::init(bus.as_ref()).unwrap();
        bus
    }

    #[test]
    fn test_output_construction_writes_initial() {
        let bus = bus();
        let pin = DigitalPin::output(bus.clone(), 7, true).unwrap();

        let sim = bus.pin(PinId(7)).unwrap();
        assert_eq!(sim.mode, Some(PinMode::Output));
        assert_eq!(sim.high_writes, 1);
        assert!(pin.state());
        assert!(!pin.just_changed());
    }

    #[test]
    fn test_input_applies_pull() {
        let bus = bus();
        let _pin =
            DigitalPin::with_pull(bus.clone(), 4, Direction::Input, false, PullMode::Up).unwrap();
        assert_eq!(bus.pin(PinId(4)).unwrap().pull, PullMode::Up);
    }

    #[test]
    fn test_reclaim_after_foreign_release() {
        let bus = bus();
        let mut out = DigitalPin::output(bus.clone(), 7, true).unwrap();
        let mut input =
            DigitalPin::with_pull(bus.clone(), 4, Direction::Input, false, PullMode::Down)
                .unwrap();

        // Another owner of the same lines lets go of them
        bus.write(PinId(7), false).unwrap();
        bus.release(PinId(7)).unwrap();
        bus.set_pull(PinId(4), PullMode::Off).unwrap();
        bus.release(PinId(4)).unwrap();

        out.reclaim().unwrap();
        input.reclaim().unwrap();

        let sim = bus.pin(PinId(7)).unwrap();
        assert_eq!(sim.mode, Some(PinMode::Output));
        assert_eq!(sim.level, out.state());
        assert!(!out.just_changed());

        let sim = bus.pin(PinId(4)).unwrap();
        assert_eq!(sim.mode, Some(PinMode::Input));
        assert_eq!(sim.pull, PullMode::Down);
    }

    #[test]
    fn test_reclaim_after_dispose_is_noop() {
        let bus = bus();
        let mut out = DigitalPin::output(bus.clone(), 7, true).unwrap();
        out.dispose();
        out.reclaim().unwrap();
        assert_eq!(bus.pin(PinId(7)).unwrap().mode, None);
        assert!(!bus.level(PinId(7)));
    }

    #[test]
    fn test_writes_are_always_edges() {
        let bus = bus();
        let mut pin = DigitalPin::output(bus.clone(), 7, false).unwrap();

        pin.write(true).unwrap();
        assert!(pin.state());
        assert!(pin.just_changed());

        pin.item_mut().set_just_changed(false);
        pin.write(true).unwrap();
        assert!(pin.just_changed());
        assert!(pin.just_changed_to(true));
        assert_eq!(bus.pin(PinId(7)).unwrap().high_writes, 2);
    }

    #[test]
    fn test_toggle() {
        let bus = bus();
        let mut pin = DigitalPin::output(bus.clone(), 7, false).unwrap();
        pin.toggle().unwrap();
        assert!(bus.level(PinId(7)));
        pin.toggle().unwrap();
        assert!(!bus.level(PinId(7)));
    }

    #[test]
    fn test_input_ignores_writes() {
        let bus = bus();
        let mut pin = DigitalPin::input(bus.clone(), 4).unwrap();
        pin.write(true).unwrap();
        assert!(!pin.state());
        assert!(!pin.just_changed());
        assert_eq!(bus.pin(PinId(4)).unwrap().writes(), 0);
    }

    #[test]
    fn test_poll_edges() {
        let bus = bus();
        let mut pin = DigitalPin::input(bus.clone(), 4).unwrap();

        bus.set_level(PinId(4), true);
        assert_eq!(pin.poll().unwrap(), Some(Edge::Rising));
        assert!(pin.just_changed());

        // Unchanged hardware clears the flag on the next poll
        assert_eq!(pin.poll().unwrap(), None);
        assert!(!pin.just_changed());

        bus.set_level(PinId(4), false);
        assert_eq!(pin.poll().unwrap(), Some(Edge::Falling));
        assert!(pin.just_changed_to(false));
    }

    #[test]
    fn test_read_cache_rules() {
        let bus = bus();
        let mut pin = DigitalPin::input(bus.clone(), 4).unwrap();
        bus.set_level(PinId(4), true);

        // Polled inputs answer from cache
        assert!(!pin.read().unwrap());

        pin.set_pollable(false);
        assert!(pin.read().unwrap());

        // Outputs never sample the bus
        let out = DigitalPin::output(bus.clone(), 7, false).unwrap();
        bus.set_level(PinId(7), true);
        assert!(!out.read().unwrap());
    }

    #[test]
    fn test_poll_bus_error() {
        let bus = bus();
        let mut pin = DigitalPin::input(bus.clone(), 4).unwrap();
        bus.fail_pin(PinId(4));
        assert_eq!(pin.poll(), Err(PinError::Bus(BusError::Io)));
    }

    #[test]
    fn test_locked_pin_refuses_writes() {
        let bus = bus();
        let mut pin = DigitalPin::output(bus.clone(), 7, false).unwrap();
        pin.item_mut().lock_hardware();
        assert_eq!(pin.write(true), Err(PinError::Locked));
        assert!(!bus.level(PinId(7)));
    }

    #[test]
    fn test_dispose_once() {
        let bus = bus();
        let mut pin = DigitalPin::output(bus.clone(), 7, true).unwrap();

        pin.dispose();
        pin.dispose();
        drop(pin);

        let sim = bus.pin(PinId(7)).unwrap();
        assert!(!sim.level);
        assert_eq!(sim.low_writes, 1);
        assert_eq!(sim.releases, 1);
    }

    #[test]
    fn test_dispose_swallows_bus_errors() {
        let bus = bus();
        let mut pin = DigitalPin::output(bus.clone(), 7, true).unwrap();
        bus.fail_pin(PinId(7));
        pin.dispose();
        assert!(pin.is_disposed());
        assert_eq!(bus.releases(PinId(7)), 1);
    }

    #[test]
    fn test_drop_disposes() {
        let bus = bus();
        let pin = DigitalPin::input(bus.clone(), 4).unwrap();
        drop(pin);
        assert_eq!(bus.releases(PinId(4)), 1);
    }

    #[test]
    fn test_construction_on_uninitialized_bus() {
        let bus = Arc::new(SimBus::new());
        let err = DigitalPin::output(bus, 7, false).unwrap_err();
        assert_eq!(err, PinError::Bus(BusError::Unavailable));
    }

    #[test]
    fn test_embedded_hal_traits() {
        use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};

        let bus = bus();
        let mut out = DigitalPin::output(bus.clone(), 7, false)
            .unwrap()
            .with_label(label("led").unwrap());
        out.set_high().unwrap();
        assert!(out.is_set_high().unwrap());
        assert!(bus.level(PinId(7)));
        assert_eq!(out.friendly_name(), Some("led"));

        let mut input = DigitalPin::input(bus.clone(), 4).unwrap();
        input.set_pollable(false);
        bus.set_level(PinId(4), true);
        assert!(input.is_high().unwrap());
    }
}
