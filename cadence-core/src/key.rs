//! Logical input keys
//!
//! A key is a named logical input (a remote button, a console key) with
//! an active/inactive state. Callers build keys and submit them to the
//! engine; from then on the engine's key table owns them and replaces
//! them by [`KeyId`] when a newer state arrives.

use core::fmt;

use crate::item::{HardwareItem, Label};

/// Logical key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyId(pub u32);

impl From<char> for KeyId {
    /// Console-style mapping: letters are case-insensitive (`'a'` == `'A'`)
    fn from(c: char) -> Self {
        KeyId(c.to_ascii_uppercase() as u32)
    }
}

impl From<u32> for KeyId {
    fn from(code: u32) -> Self {
        KeyId(code)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match char::from_u32(self.0) {
            Some(c) if c.is_ascii_graphic() => write!(f, "key '{}'", c),
            _ => write!(f, "key #{}", self.0),
        }
    }
}

/// Activation state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum KeyState {
    /// Released / off
    #[default]
    Inactive = 0,
    /// Pressed / on
    Active = 1,
}

impl KeyState {
    /// State from a boolean (true = active)
    pub fn from_bool(active: bool) -> Self {
        if active {
            KeyState::Active
        } else {
            KeyState::Inactive
        }
    }

    /// True for [`KeyState::Active`]
    pub fn is_active(self) -> bool {
        matches!(self, KeyState::Active)
    }

    /// Create a state from its wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KeyState::Inactive),
            1 => Some(KeyState::Active),
            _ => None,
        }
    }
}

/// A logical input state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    item: HardwareItem,
    id: KeyId,
    state: KeyState,
}

impl Key {
    /// Create an unnamed key
    pub fn new(id: impl Into<KeyId>, state: KeyState) -> Self {
        Self {
            item: HardwareItem::new(),
            id: id.into(),
            state,
        }
    }

    /// Create an active key
    pub fn active(id: impl Into<KeyId>) -> Self {
        Self::new(id, KeyState::Active)
    }

    /// Create an inactive key
    pub fn inactive(id: impl Into<KeyId>) -> Self {
        Self::new(id, KeyState::Inactive)
    }

    /// Attach a friendly name
    pub fn with_label(mut self, name: Label) -> Self {
        self.item.set_label(name);
        self
    }

    /// Key identifier
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// True if the key is active
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Check if the key has the given state
    pub fn is(&self, state: KeyState) -> bool {
        self.state == state
    }

    /// Check if the key changed to the given state this cycle
    pub fn just_changed_to(&self, state: KeyState) -> bool {
        self.state == state && self.item.just_changed()
    }

    /// Edge flag for the current cycle
    pub fn just_changed(&self) -> bool {
        self.item.just_changed()
    }

    /// Friendly name, if assigned
    pub fn friendly_name(&self) -> Option<&str> {
        self.item.friendly_name()
    }

    /// Shared item record
    pub fn item(&self) -> &HardwareItem {
        &self.item
    }

    /// Mutable item record
    pub fn item_mut(&mut self) -> &mut HardwareItem {
        &mut self.item
    }
}
