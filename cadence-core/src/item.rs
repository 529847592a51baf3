//! Hardware item record
//!
//! State shared by every polled or submitted entity (keys and pins): an
//! optional friendly name, the edge flag for the current cycle and the
//! one-way hardware lockout latch.

use core::fmt::Write;

use cadence_hal::PinMode;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::naming::NameGenerator;

/// Maximum friendly name length
pub const MAX_LABEL_LEN: usize = 32;

/// Friendly name storage
pub type Label = heapless::String<MAX_LABEL_LEN>;

/// Build a label from a string slice, or `None` if it does not fit
pub fn label(name: &str) -> Option<Label> {
    let mut label = Label::new();
    label.push_str(name).ok()?;
    Some(label)
}

/// Build a label from a kind prefix and a numeric suffix
///
/// The prefix is shortened if needed; the suffix is always kept.
pub fn compose_label(kind: &str, suffix: u32) -> Label {
    // u32::MAX has 10 digits
    let room = MAX_LABEL_LEN - 10;
    let mut label = Label::new();
    for c in kind.chars() {
        if label.len() + c.len_utf8() > room {
            break;
        }
        let _ = label.push(c);
    }
    let _ = write!(label, "{}", suffix);
    label
}

/// Direction of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Sampled by polling
    #[default]
    Input,
    /// Driven by writes
    Output,
}

impl Direction {
    /// Bus mode for this direction
    pub fn mode(self) -> PinMode {
        match self {
            Direction::Input => PinMode::Input,
            Direction::Output => PinMode::Output,
        }
    }
}

/// A transition between two observed levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low to high
    Rising,
    /// High to low
    Falling,
}

impl Edge {
    /// Edge between two levels, or `None` if they are equal
    pub fn between(previous: bool, current: bool) -> Option<Self> {
        match (previous, current) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        }
    }

    /// Edge that ends at `level`
    pub fn to(level: bool) -> Self {
        if level {
            Edge::Rising
        } else {
            Edge::Falling
        }
    }

    /// Level after the edge
    pub fn level(self) -> bool {
        matches!(self, Edge::Rising)
    }
}

/// Common record for keys and pins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareItem {
    friendly_name: Option<Label>,
    just_changed: bool,
    /// Edge raised since observers were last notified
    pending_notice: bool,
    hardware_locked: bool,
}

impl HardwareItem {
    /// Create an unnamed, unlocked record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record with a friendly name
    pub fn named(name: Label) -> Self {
        Self {
            friendly_name: Some(name),
            ..Self::default()
        }
    }

    /// Friendly name, if one has been assigned
    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    /// Assign a friendly name
    ///
    /// Returns false (leaving the name unchanged) if it does not fit.
    pub fn set_friendly_name(&mut self, name: &str) -> bool {
        match label(name) {
            Some(label) => {
                self.friendly_name = Some(label);
                true
            }
            None => false,
        }
    }

    /// Replace the friendly name with an existing label
    pub fn set_label(&mut self, name: Label) {
        self.friendly_name = Some(name);
    }

    /// Return the friendly name, generating one first if unset
    pub fn ensure_name(&mut self, kind: &str, names: &mut dyn NameGenerator) -> &str {
        self.friendly_name
            .get_or_insert_with(|| names.generate(kind))
            .as_str()
    }

    /// Check if the item changed state this cycle
    pub fn just_changed(&self) -> bool {
        self.just_changed
    }

    /// Set the edge flag directly
    pub fn set_just_changed(&mut self, changed: bool) {
        self.just_changed = changed;
        if changed {
            self.pending_notice = true;
        }
    }

    /// Record an observed transition
    ///
    /// Sets the edge flag if the level differs and returns the edge.
    pub fn observe(&mut self, previous: bool, current: bool) -> Option<Edge> {
        let edge = Edge::between(previous, current);
        self.set_just_changed(edge.is_some());
        edge
    }

    /// Take the pending notification bit
    ///
    /// True once per raised edge, until observers have been told.
    pub fn take_notice(&mut self) -> bool {
        core::mem::take(&mut self.pending_notice)
    }

    /// Check the hardware lockout latch
    pub fn is_hardware_locked(&self) -> bool {
        self.hardware_locked
    }

    /// Engage the hardware lockout latch
    pub fn lock_hardware(&mut self) {
        self.hardware_locked = true;
    }

    /// Set the latch; attempts to release an engaged latch are ignored
    pub fn set_hardware_locked(&mut self, locked: bool) {
        if !self.hardware_locked {
            self.hardware_locked = locked;
        }
    }
}
