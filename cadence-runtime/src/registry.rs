//! Pin registry
//!
//! Ordered collection of pins, unique by physical id. Adding a pin whose
//! id is already registered disposes the previous owner first, so no
//! physical pin is ever driven by two live drivers.

use core::fmt;

use cadence_core::{Label, NameGenerator, RandomSuffix};
use cadence_hal::PinId;
use cadence_pins::{Pin, PinDriver, PinVariant, SharedBus};
use tracing::{debug, info, warn};

/// Generated names are re-drawn this many times on collision
const MAX_NAME_DRAWS: usize = 16;

/// Registry lookup key: physical id or friendly name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinKey {
    /// Physical pin
    Id(PinId),
    /// Friendly name
    Name(String),
}

impl From<PinId> for PinKey {
    fn from(id: PinId) -> Self {
        PinKey::Id(id)
    }
}

impl From<u8> for PinKey {
    fn from(number: u8) -> Self {
        PinKey::Id(PinId(number))
    }
}

impl From<&str> for PinKey {
    fn from(name: &str) -> Self {
        PinKey::Name(name.to_string())
    }
}

impl From<&Label> for PinKey {
    fn from(name: &Label) -> Self {
        PinKey::Name(name.as_str().to_string())
    }
}

impl fmt::Display for PinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinKey::Id(id) => write!(f, "{}", id),
            PinKey::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Why a lookup failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Nothing registered under the key
    NotFound(PinKey),
    /// Registered, but not the requested variant
    WrongType {
        /// Key that matched
        key: PinKey,
        /// Requested variant
        expected: &'static str,
        /// Registered variant
        found: &'static str,
    },
    /// Registered, but writes would not reach the hardware
    NotOutput(PinKey),
}

impl LookupError {
    /// Key the lookup was made with
    pub fn key(&self) -> &PinKey {
        match self {
            LookupError::NotFound(key)
            | LookupError::WrongType { key, .. }
            | LookupError::NotOutput(key) => key,
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound(key) => write!(f, "no pin registered as {}", key),
            LookupError::WrongType {
                key,
                expected,
                found,
            } => write!(f, "pin {} is a {}, not a {}", key, found, expected),
            LookupError::NotOutput(key) => write!(f, "pin {} is not an output", key),
        }
    }
}

impl std::error::Error for LookupError {}

/// Registered pins
pub struct Registry {
    bus: SharedBus,
    pins: Vec<Pin>,
    names: Box<dyn NameGenerator>,
}

impl Registry {
    /// Empty registry with random friendly names
    pub fn new(bus: SharedBus) -> Self {
        Self::with_names(bus, Box::new(RandomSuffix::new()))
    }

    /// Empty registry with an injected name generator
    pub fn with_names(bus: SharedBus, names: Box<dyn NameGenerator>) -> Self {
        Self {
            bus,
            pins: Vec::new(),
            names,
        }
    }

    /// Bus used to construct pins
    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// Register a pin with polling enabled
    pub fn add(&mut self, pin: impl Into<Pin>) -> &mut Pin {
        self.add_with(pin, true)
    }

    /// Register a pin, replacing any pin with the same physical id
    ///
    /// The replaced pin is driven low (if an output) and released, then the
    /// new pin re-applies its mode and level so the hardware matches its
    /// cached state. Unnamed pins get a generated name that no other
    /// registered pin uses.
    pub fn add_with(&mut self, pin: impl Into<Pin>, pollable: bool) -> &mut Pin {
        let mut pin = pin.into();
        let id = pin.physical_id();

        if let Some(index) = self.position(id) {
            let mut old = self.pins.remove(index);
            old.dispose();
            info!("Replaced {} on {}", old.kind(), id);
            if let Err(e) = pin.reclaim() {
                warn!("Could not reconfigure {}: {}", id, e);
            }
        }

        pin.set_pollable(pollable);
        if pin.friendly_name().is_none() {
            let name = self.unique_name(pin.kind());
            pin.item_mut().set_label(name);
        }
        debug!(
            "Registered {} {} on {}",
            pin.kind(),
            pin.friendly_name().unwrap_or_default(),
            id
        );

        self.pins.push(pin);
        let last = self.pins.len() - 1;
        &mut self.pins[last]
    }

    fn unique_name(&mut self, kind: &str) -> Label {
        let mut name = self.names.generate(kind);
        for _ in 1..MAX_NAME_DRAWS {
            if !self.name_taken(&name) {
                break;
            }
            name = self.names.generate(kind);
        }
        name
    }

    fn name_taken(&self, name: &str) -> bool {
        self.pins.iter().any(|p| p.friendly_name() == Some(name))
    }

    fn position(&self, id: PinId) -> Option<usize> {
        self.pins.iter().position(|p| p.physical_id() == id)
    }

    fn find(&self, key: &PinKey) -> Option<usize> {
        match key {
            PinKey::Id(id) => self.position(*id),
            PinKey::Name(name) => self
                .pins
                .iter()
                .position(|p| p.friendly_name() == Some(name.as_str())),
        }
    }

    /// Dispose and unregister the pin on `id`
    ///
    /// Returns false if nothing was registered there.
    pub fn remove(&mut self, id: impl Into<PinId>) -> bool {
        let id = id.into();
        match self.position(id) {
            Some(index) => {
                let mut pin = self.pins.remove(index);
                pin.dispose();
                info!("Removed {} on {}", pin.kind(), id);
                true
            }
            None => false,
        }
    }

    /// Typed lookup
    pub fn get<T: PinVariant>(&self, key: impl Into<PinKey>) -> Result<&T, LookupError> {
        let key = key.into();
        let index = self
            .find(&key)
            .ok_or_else(|| LookupError::NotFound(key.clone()))?;
        let pin = &self.pins[index];
        T::view(pin).ok_or(LookupError::WrongType {
            key,
            expected: T::KIND,
            found: pin.kind(),
        })
    }

    /// Typed mutable lookup
    pub fn get_mut<T: PinVariant>(&mut self, key: impl Into<PinKey>) -> Result<&mut T, LookupError> {
        let key = key.into();
        let index = self
            .find(&key)
            .ok_or_else(|| LookupError::NotFound(key.clone()))?;
        let found = self.pins[index].kind();
        T::view_mut(&mut self.pins[index]).ok_or(LookupError::WrongType {
            key,
            expected: T::KIND,
            found,
        })
    }

    /// Check if a pin is registered under `key`
    pub fn contains(&self, key: impl Into<PinKey>) -> bool {
        self.find(&key.into()).is_some()
    }

    /// Number of registered pins
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// True if no pins are registered
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Pins in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter()
    }

    /// Mutable pins in registration order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pin> {
        self.pins.iter_mut()
    }

    /// Dispose and unregister every pin
    pub fn dispose_all(&mut self) {
        for mut pin in self.pins.drain(..) {
            pin.dispose();
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("pins", &self.pins).finish()
    }
}
