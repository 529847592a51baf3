//! Message types
//!
//! Control codes map to payload-free variants, except
//! `MessageFromRuntime` which carries UTF-8 text. Item codes carry a
//! postcard-encoded struct.

use core::fmt;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::codes::{CommunicationCode, RebootTarget};
use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};

/// Maximum friendly name length on the wire
pub const MAX_NAME_LEN: usize = 32;

/// Maximum runtime text message length
pub const MAX_TEXT_LEN: usize = MAX_PAYLOAD_SIZE;

/// Friendly name on the wire
pub type WireName = String<MAX_NAME_LEN>;

/// Message-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// Framing failed
    Frame(FrameError),
    /// Code byte not assigned
    UnknownCode(u8),
    /// Code known but not accepted here
    Unsupported(CommunicationCode),
    /// Payload could not be decoded
    Decode,
    /// Message could not be encoded
    Encode,
    /// Key state byte other than 0 or 1
    InvalidState(u8),
    /// Text payload is not UTF-8
    InvalidText,
    /// Friendly name exceeds [`MAX_NAME_LEN`]
    NameTooLong,
}

impl From<FrameError> for MessageError {
    fn from(e: FrameError) -> Self {
        MessageError::Frame(e)
    }
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::Frame(e) => write!(f, "{}", e),
            MessageError::UnknownCode(code) => write!(f, "unknown communication code {}", code),
            MessageError::Unsupported(code) => write!(f, "{} not accepted here", code),
            MessageError::Decode => f.write_str("payload decode failed"),
            MessageError::Encode => f.write_str("message encode failed"),
            MessageError::InvalidState(s) => write!(f, "invalid key state {}", s),
            MessageError::InvalidText => f.write_str("text payload is not UTF-8"),
            MessageError::NameTooLong => write!(f, "name exceeds {} bytes", MAX_NAME_LEN),
        }
    }
}

impl core::error::Error for MessageError {}

fn wire_name(name: &str) -> Result<WireName, MessageError> {
    let mut out = WireName::new();
    out.push_str(name).map_err(|_| MessageError::NameTooLong)?;
    Ok(out)
}

/// Key state update from a remote peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMessage {
    /// Logical key identifier
    pub id: u32,
    /// 0 = inactive, 1 = active
    pub state: u8,
    /// Optional friendly name
    pub name: Option<WireName>,
}

impl KeyMessage {
    /// Unnamed key update
    pub fn new(id: u32, active: bool) -> Self {
        Self {
            id,
            state: u8::from(active),
            name: None,
        }
    }

    /// Attach a friendly name
    pub fn with_name(mut self, name: &str) -> Result<Self, MessageError> {
        self.name = Some(wire_name(name)?);
        Ok(self)
    }

    /// True if the key is active
    pub fn is_active(&self) -> bool {
        self.state == 1
    }

    fn validate(self) -> Result<Self, MessageError> {
        match self.state {
            0 | 1 => Ok(self),
            other => Err(MessageError::InvalidState(other)),
        }
    }
}

/// Pin state report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMessage {
    /// Physical pin number
    pub id: u8,
    /// Current level
    pub high: bool,
    /// Edge flag for the reported cycle
    pub just_changed: bool,
    /// Optional friendly name
    pub name: Option<WireName>,
}

impl PinMessage {
    /// Unnamed pin report
    pub fn new(id: u8, high: bool, just_changed: bool) -> Self {
        Self {
            id,
            high,
            just_changed,
            name: None,
        }
    }

    /// Attach a friendly name
    pub fn with_name(mut self, name: &str) -> Result<Self, MessageError> {
        self.name = Some(wire_name(name)?);
        Ok(self)
    }
}

/// Any decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteMessage {
    /// Status ok
    AllGood,
    /// Fatal error on the peer
    FatalError,
    /// Text from the runtime
    Text(String<MAX_TEXT_LEN>),
    /// Reboot request
    Reboot(RebootTarget),
    /// Switch to local control
    StopNetworkCommunication,
    /// Key update
    Key(KeyMessage),
    /// Pin report
    Pin(PinMessage),
}

impl RemoteMessage {
    /// Text message, truncated at a character boundary if too long
    pub fn text(message: &str) -> Self {
        let mut text = String::new();
        for c in message.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        RemoteMessage::Text(text)
    }

    /// Code this message travels under
    pub fn code(&self) -> CommunicationCode {
        match self {
            RemoteMessage::AllGood => CommunicationCode::AllGood,
            RemoteMessage::FatalError => CommunicationCode::FatalError,
            RemoteMessage::Text(_) => CommunicationCode::MessageFromRuntime,
            RemoteMessage::Reboot(target) => target.code(),
            RemoteMessage::StopNetworkCommunication => CommunicationCode::StopNetworkCommunication,
            RemoteMessage::Key(_) => CommunicationCode::Key,
            RemoteMessage::Pin(_) => CommunicationCode::Pin,
        }
    }

    /// Decode a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, MessageError> {
        let code = frame
            .code()
            .ok_or(MessageError::UnknownCode(frame.code_byte()))?;
        let payload = frame.payload();

        if let Some(target) = code.reboot_target() {
            return Ok(RemoteMessage::Reboot(target));
        }

        match code {
            CommunicationCode::AllGood => Ok(RemoteMessage::AllGood),
            CommunicationCode::FatalError => Ok(RemoteMessage::FatalError),
            CommunicationCode::StopNetworkCommunication => {
                Ok(RemoteMessage::StopNetworkCommunication)
            }
            CommunicationCode::MessageFromRuntime => {
                let text = core::str::from_utf8(payload).map_err(|_| MessageError::InvalidText)?;
                // Payload length is bounded by the frame
                Ok(RemoteMessage::text(text))
            }
            CommunicationCode::Key => {
                let key: KeyMessage =
                    postcard::from_bytes(payload).map_err(|_| MessageError::Decode)?;
                key.validate().map(RemoteMessage::Key)
            }
            CommunicationCode::Pin => postcard::from_bytes(payload)
                .map(RemoteMessage::Pin)
                .map_err(|_| MessageError::Decode),
            other => Err(MessageError::Unsupported(other)),
        }
    }

    /// Encode into a frame
    pub fn to_frame(&self) -> Result<Frame, MessageError> {
        let code = self.code();
        let mut buf = [0u8; MAX_PAYLOAD_SIZE];
        let payload: &[u8] = match self {
            RemoteMessage::Text(text) => text.as_bytes(),
            RemoteMessage::Key(key) => {
                postcard::to_slice(key, &mut buf).map_err(|_| MessageError::Encode)?
            }
            RemoteMessage::Pin(pin) => {
                postcard::to_slice(pin, &mut buf).map_err(|_| MessageError::Encode)?
            }
            _ => &[],
        };
        Ok(Frame::new(code, payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_frame() {
        let msg = RemoteMessage::Key(KeyMessage::new('A' as u32, true).with_name("fire").unwrap());
        let frame = msg.to_frame().unwrap();
        assert_eq!(frame.code(), Some(CommunicationCode::Key));

        let decoded = RemoteMessage::from_frame(&frame).unwrap();
        let RemoteMessage::Key(key) = decoded else {
            panic!("expected key message");
        };
        assert_eq!(key.id, 65);
        assert!(key.is_active());
        assert_eq!(key.name.as_deref(), Some("fire"));
    }

    #[test]
    fn test_invalid_key_state() {
        let bad = KeyMessage {
            id: 1,
            state: 9,
            name: None,
        };
        let mut buf = [0u8; 16];
        let payload = postcard::to_slice(&bad, &mut buf).unwrap();
        let frame = Frame::new(CommunicationCode::Key, payload).unwrap();
        assert_eq!(
            RemoteMessage::from_frame(&frame),
            Err(MessageError::InvalidState(9))
        );
    }

    #[test]
    fn test_truncated_payload() {
        let frame = Frame::new(CommunicationCode::Key, &[]).unwrap();
        assert_eq!(RemoteMessage::from_frame(&frame), Err(MessageError::Decode));
    }

    #[test]
    fn test_control_codes() {
        for msg in [
            RemoteMessage::AllGood,
            RemoteMessage::FatalError,
            RemoteMessage::Reboot(RebootTarget::Machine),
            RemoteMessage::StopNetworkCommunication,
        ] {
            let frame = msg.to_frame().unwrap();
            assert!(frame.payload().is_empty());
            assert_eq!(RemoteMessage::from_frame(&frame).unwrap(), msg);
        }
    }

    #[test]
    fn test_text_message() {
        let frame = RemoteMessage::text("engine started").to_frame().unwrap();
        assert_eq!(frame.payload(), b"engine started");

        let bad = Frame::new(CommunicationCode::MessageFromRuntime, &[0xFF, 0xFE]).unwrap();
        assert_eq!(RemoteMessage::from_frame(&bad), Err(MessageError::InvalidText));
    }

    #[test]
    fn test_unknown_and_unsupported() {
        let frame = Frame::from_raw(42, &[]).unwrap();
        assert_eq!(
            RemoteMessage::from_frame(&frame),
            Err(MessageError::UnknownCode(42))
        );

        let frame = Frame::empty(CommunicationCode::GpioItem);
        assert_eq!(
            RemoteMessage::from_frame(&frame),
            Err(MessageError::Unsupported(CommunicationCode::GpioItem))
        );
    }

    #[test]
    fn test_name_too_long() {
        let long = "a name that is definitely longer than thirty-two bytes";
        assert_eq!(
            KeyMessage::new(1, false).with_name(long),
            Err(MessageError::NameTooLong)
        );
    }

    #[test]
    fn test_pin_report() {
        let msg = RemoteMessage::Pin(PinMessage::new(7, true, true).with_name("led").unwrap());
        let frame = msg.to_frame().unwrap();
        assert_eq!(RemoteMessage::from_frame(&frame).unwrap(), msg);
    }
}
