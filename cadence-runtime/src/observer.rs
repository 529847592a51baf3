//! Engine observers
//!
//! Observers receive hardware state changes and faults from the polling
//! thread. Callbacks run on that thread, so they must return quickly;
//! [`ChannelObserver`] moves events to another thread instead.
//!
//! A panicking observer never takes the polling thread down. A panic in
//! `on_hardware_state_changed` is reported to the other observers as a
//! [`FaultKind::UserCallback`](cadence_core::FaultKind::UserCallback)
//! fault; a panic in `on_unhandled_fault` is only logged.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use cadence_core::fault::panic_message;
use cadence_core::{Edge, Fault, Label};
use cadence_hal::PinId;
use cadence_pins::{Pin, PinDriver};
use tracing::warn;

/// Pin state at the moment an edge was reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSnapshot {
    /// Physical pin
    pub id: PinId,
    /// Friendly name
    pub name: Option<Label>,
    /// Variant name
    pub kind: &'static str,
    /// Level after the edge
    pub state: bool,
    /// Engine cycle the edge was seen in
    pub cycle: u64,
}

impl PinSnapshot {
    /// Capture a pin
    pub fn capture(pin: &Pin, cycle: u64) -> Self {
        Self {
            id: pin.physical_id(),
            name: pin.friendly_name().and_then(cadence_core::item::label),
            kind: pin.kind(),
            state: pin.state(),
            cycle,
        }
    }

    /// Edge that led to this state
    pub fn edge(&self) -> Edge {
        Edge::to(self.state)
    }
}

/// Receiver of engine notifications
///
/// Both methods default to doing nothing.
pub trait Observer: Send + Sync {
    /// A pin's edge flag was raised this cycle
    fn on_hardware_state_changed(&self, _pin: &PinSnapshot) {}

    /// Something failed; `is_fatal` means the polling thread is exiting
    fn on_unhandled_fault(&self, _fault: &Fault, _is_fatal: bool) {}
}

/// Shared, growable observer list
#[derive(Clone, Default)]
pub struct Observers {
    list: Arc<Mutex<Vec<Arc<dyn Observer>>>>,
}

impl Observers {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn add(&self, observer: Arc<dyn Observer>) {
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.list.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nobody is listening
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Callbacks run without the list lock held so observers can register
    // further observers.
    fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Report a hardware state change
    pub fn state_changed(&self, pin: &PinSnapshot) {
        let observers = self.snapshot();
        for (index, observer) in observers.iter().enumerate() {
            let delivered =
                catch_unwind(AssertUnwindSafe(|| observer.on_hardware_state_changed(pin)));
            if let Err(payload) = delivered {
                let fault = Fault::user_callback(format_args!(
                    "observer panicked on {}: {}",
                    pin.id,
                    panic_message(payload.as_ref())
                ));
                warn!("{}", fault);
                deliver_fault(&observers, Some(index), &fault);
            }
        }
    }

    /// Report a fault
    pub fn fault(&self, fault: &Fault) {
        deliver_fault(&self.snapshot(), None, fault);
    }
}

fn deliver_fault(observers: &[Arc<dyn Observer>], skip: Option<usize>, fault: &Fault) {
    let fatal = fault.is_fatal();
    for (index, observer) in observers.iter().enumerate() {
        if skip == Some(index) {
            continue;
        }
        let delivered = catch_unwind(AssertUnwindSafe(|| observer.on_unhandled_fault(fault, fatal)));
        if let Err(payload) = delivered {
            warn!(
                "Observer panicked while handling \"{}\": {}",
                fault,
                panic_message(payload.as_ref())
            );
        }
    }
}

impl core::fmt::Debug for Observers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observers").field("len", &self.len()).finish()
    }
}

/// Notification forwarded by [`ChannelObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pin changed state
    StateChanged(PinSnapshot),
    /// A fault was reported
    Fault {
        /// The fault
        fault: Fault,
        /// The polling thread is exiting
        fatal: bool,
    },
}

/// Observer that forwards every notification over a channel
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Mutex<Sender<EngineEvent>>,
}

impl ChannelObserver {
    /// Observer and the receiving end of its channel
    pub fn new() -> (Arc<Self>, Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx: Mutex::new(tx) }), rx)
    }

    fn send(&self, event: EngineEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event);
    }
}

impl Observer for ChannelObserver {
    fn on_hardware_state_changed(&self, pin: &PinSnapshot) {
        self.send(EngineEvent::StateChanged(pin.clone()));
    }

    fn on_unhandled_fault(&self, fault: &Fault, is_fatal: bool) {
        self.send(EngineEvent::Fault {
            fault: fault.clone(),
            fatal: is_fatal,
        });
    }
}
