//! Fault taxonomy
//!
//! Nothing that goes wrong inside the engine is allowed to escape the
//! polling thread. Failures are wrapped in a [`Fault`] and handed to the
//! engine's observers together with a flag saying whether the polling
//! thread is about to exit.
//!
//! | Kind | Source | Fatal |
//! |------|--------|-------|
//! | `Setup` | bus init or user setup failed | no |
//! | `Lookup` | registry miss or wrong pin variant | no |
//! | `UserCallback` | per-cycle logic returned an error or panicked | no |
//! | `Bus` | a hardware read failed while polling | no |
//! | `Loop` | the engine's own bookkeeping panicked | yes |
//!
//! Disposal never produces faults, and attempts to release a hardware
//! lockout are ignored without a report.

use core::fmt;

/// Boxed error returned by user logic
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fault category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// Hardware init or user setup failed
    Setup,
    /// Registry miss or type mismatch
    Lookup,
    /// Per-cycle user logic failed
    UserCallback,
    /// Hardware capability failed during polling
    Bus,
    /// Engine bookkeeping failed; the polling thread exits
    Loop,
}

impl FaultKind {
    /// Check if faults of this kind terminate the polling thread
    pub fn is_fatal(self) -> bool {
        matches!(self, FaultKind::Loop)
    }

    fn as_str(self) -> &'static str {
        match self {
            FaultKind::Setup => "setup",
            FaultKind::Lookup => "lookup",
            FaultKind::UserCallback => "user callback",
            FaultKind::Bus => "bus",
            FaultKind::Loop => "loop",
        }
    }
}

/// A reported engine fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    kind: FaultKind,
    detail: String,
}

impl Fault {
    /// Create a fault
    pub fn new(kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Setup fault
    pub fn setup(detail: impl fmt::Display) -> Self {
        Self::new(FaultKind::Setup, detail.to_string())
    }

    /// Lookup fault
    pub fn lookup(detail: impl fmt::Display) -> Self {
        Self::new(FaultKind::Lookup, detail.to_string())
    }

    /// User callback fault
    pub fn user_callback(detail: impl fmt::Display) -> Self {
        Self::new(FaultKind::UserCallback, detail.to_string())
    }

    /// Bus fault
    pub fn bus(detail: impl fmt::Display) -> Self {
        Self::new(FaultKind::Bus, detail.to_string())
    }

    /// Loop fault
    pub fn fatal(detail: impl fmt::Display) -> Self {
        Self::new(FaultKind::Loop, detail.to_string())
    }

    /// Fault category
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Human-readable detail
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Check if this fault terminates the polling thread
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for Fault {}

/// Extract a readable message from a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
