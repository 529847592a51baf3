//! Communication codes
//!
//! One byte in every frame says what the payload is. Values below 60 are
//! control codes between the runtime and a remote peer; 60 and above tag
//! serialized hardware items.

use core::fmt;

/// First item code; everything below is a control code
const FIRST_ITEM_CODE: u8 = 60;

/// Frame content tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommunicationCode {
    /// Everything is fine
    AllGood = 0,
    /// A fatal error occurred
    FatalError = 1,
    /// Text message from the runtime
    MessageFromRuntime = 2,
    /// Fatal error; the runtime will be restarted unless refused
    RequestingRebootRuntime = 3,
    /// Fatal error; the host program will be restarted unless refused
    RequestingRebootProgram = 4,
    /// Fatal error; the machine will be restarted unless refused
    RequestingRebootMachine = 5,
    /// Stop network communication and run the local control program
    StopNetworkCommunication = 6,
    /// Generic hardware item
    GpioItem = 60,
    /// Key state
    Key = 61,
    /// Pin state
    Pin = 62,
}

impl CommunicationCode {
    /// Wire value
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Parse a wire value
    pub fn from_byte(byte: u8) -> Option<Self> {
        let code = match byte {
            0 => CommunicationCode::AllGood,
            1 => CommunicationCode::FatalError,
            2 => CommunicationCode::MessageFromRuntime,
            3 => CommunicationCode::RequestingRebootRuntime,
            4 => CommunicationCode::RequestingRebootProgram,
            5 => CommunicationCode::RequestingRebootMachine,
            6 => CommunicationCode::StopNetworkCommunication,
            60 => CommunicationCode::GpioItem,
            61 => CommunicationCode::Key,
            62 => CommunicationCode::Pin,
            _ => return None,
        };
        Some(code)
    }

    /// True for control codes (0-59)
    pub fn is_control(self) -> bool {
        self.to_byte() < FIRST_ITEM_CODE
    }

    /// True for item codes (60+)
    pub fn is_item(self) -> bool {
        !self.is_control()
    }

    /// Reboot scope for the reboot-request codes
    pub fn reboot_target(self) -> Option<RebootTarget> {
        match self {
            CommunicationCode::RequestingRebootRuntime => Some(RebootTarget::Runtime),
            CommunicationCode::RequestingRebootProgram => Some(RebootTarget::Program),
            CommunicationCode::RequestingRebootMachine => Some(RebootTarget::Machine),
            _ => None,
        }
    }
}

impl TryFrom<u8> for CommunicationCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_byte(byte).ok_or(byte)
    }
}

impl fmt::Display for CommunicationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.to_byte())
    }
}

/// What a reboot request would restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RebootTarget {
    /// The polling runtime only
    Runtime,
    /// The whole host program
    Program,
    /// The machine
    Machine,
}

impl RebootTarget {
    /// Code carrying this request
    pub fn code(self) -> CommunicationCode {
        match self {
            RebootTarget::Runtime => CommunicationCode::RequestingRebootRuntime,
            RebootTarget::Program => CommunicationCode::RequestingRebootProgram,
            RebootTarget::Machine => CommunicationCode::RequestingRebootMachine,
        }
    }
}
