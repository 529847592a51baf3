//! Frame encoding and decoding
//!
//! - START (1 byte): 0xAA synchronization byte
//! - LENGTH (1 byte): payload length (0-250)
//! - CODE (1 byte): communication code
//! - PAYLOAD (0-250 bytes)
//! - CHECKSUM (1 byte): XOR of LENGTH, CODE and every PAYLOAD byte
//!
//! The code byte is kept raw so that frames with codes this build does
//! not know still parse; [`Frame::code`] interprets it.

use core::fmt;

use heapless::Vec;

use crate::codes::CommunicationCode;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0xAA;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// START + LENGTH + CODE + CHECKSUM
const OVERHEAD: usize = 4;

/// Maximum encoded frame size
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + OVERHEAD;

/// Frame-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds [`MAX_PAYLOAD_SIZE`]
    PayloadTooLarge,
    /// LENGTH byte exceeds [`MAX_PAYLOAD_SIZE`]
    InvalidLength(u8),
    /// Checksum mismatch
    InvalidChecksum,
    /// Output buffer too small
    BufferTooSmall,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PayloadTooLarge => write!(f, "payload exceeds {} bytes", MAX_PAYLOAD_SIZE),
            FrameError::InvalidLength(len) => write!(f, "invalid frame length {}", len),
            FrameError::InvalidChecksum => f.write_str("frame checksum mismatch"),
            FrameError::BufferTooSmall => f.write_str("output buffer too small"),
        }
    }
}

impl core::error::Error for FrameError {}

fn checksum(length: u8, code: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(length ^ code, |acc, b| acc ^ b)
}

/// One framed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    code: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Frame with a payload
    pub fn new(code: CommunicationCode, payload: &[u8]) -> Result<Self, FrameError> {
        Self::from_raw(code.to_byte(), payload)
    }

    /// Frame without payload
    pub fn empty(code: CommunicationCode) -> Self {
        Self {
            code: code.to_byte(),
            payload: Vec::new(),
        }
    }

    /// Frame with an arbitrary code byte
    pub fn from_raw(code: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { code, payload })
    }

    /// Raw code byte
    pub fn code_byte(&self) -> u8 {
        self.code
    }

    /// Interpreted code, or `None` if unknown
    pub fn code(&self) -> Option<CommunicationCode> {
        CommunicationCode::from_byte(self.code)
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + OVERHEAD
    }

    /// Encode into `out`, returning the number of bytes written
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.encoded_len();
        let out = out.get_mut(..len).ok_or(FrameError::BufferTooSmall)?;
        let length = self.payload.len() as u8;

        let (head, rest) = out.split_at_mut(3);
        head.copy_from_slice(&[FRAME_START, length, self.code]);
        let (body, tail) = rest.split_at_mut(self.payload.len());
        body.copy_from_slice(&self.payload);
        tail[0] = checksum(length, self.code, &self.payload);

        Ok(len)
    }

    /// Encode into a fixed-capacity vector
    pub fn to_bytes(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut out = Vec::new();
        // Capacity always covers a valid frame
        let _ = out.resize(self.encoded_len(), 0);
        let _ = self.encode(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Sync,
    Length,
    Code,
    Payload,
    Checksum,
}

/// Incremental frame decoder
///
/// Bytes outside a frame are skipped until the next START byte. After an
/// error the parser resynchronizes on its own.
#[derive(Debug, Clone)]
pub struct FrameParser {
    stage: Stage,
    length: u8,
    code: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Parser waiting for a START byte
    pub fn new() -> Self {
        Self {
            stage: Stage::Sync,
            length: 0,
            code: 0,
            payload: Vec::new(),
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Check if a frame is partially received
    pub fn in_frame(&self) -> bool {
        self.stage != Stage::Sync
    }

    /// Feed one byte; returns a frame when one completes
    pub fn push(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.stage {
            Stage::Sync => {
                if byte == FRAME_START {
                    self.stage = Stage::Length;
                }
            }
            Stage::Length => {
                if usize::from(byte) > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::InvalidLength(byte));
                }
                self.length = byte;
                self.stage = Stage::Code;
            }
            Stage::Code => {
                self.code = byte;
                self.payload.clear();
                self.stage = if self.length == 0 {
                    Stage::Checksum
                } else {
                    Stage::Payload
                };
            }
            Stage::Payload => {
                // Length was bounded when read
                let _ = self.payload.push(byte);
                if self.payload.len() == usize::from(self.length) {
                    self.stage = Stage::Checksum;
                }
            }
            Stage::Checksum => {
                let expected = checksum(self.length, self.code, &self.payload);
                let frame = Frame {
                    code: self.code,
                    payload: core::mem::take(&mut self.payload),
                };
                self.reset();
                if byte != expected {
                    return Err(FrameError::InvalidChecksum);
                }
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Feed bytes until a frame completes
    ///
    /// Returns the frame and how many bytes were consumed; bytes after
    /// the frame are left for the next call.
    pub fn push_slice(&mut self, bytes: &[u8]) -> (Result<Option<Frame>, FrameError>, usize) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.push(byte) {
                Ok(None) => {}
                other => return (other, i + 1),
            }
        }
        (Ok(None), bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_empty() {
        let frame = Frame::empty(CommunicationCode::AllGood);
        let mut out = [0u8; 8];
        assert_eq!(frame.encode(&mut out), Ok(4));
        assert_eq!(&out[..4], &[FRAME_START, 0, 0, 0]);
    }

    #[test]
    fn test_encode_layout() {
        let frame = Frame::new(CommunicationCode::Key, &[0x10, 0x01]).unwrap();
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[..], &[FRAME_START, 2, 61, 0x10, 0x01, 2 ^ 61 ^ 0x10 ^ 0x01]);
    }

    #[test]
    fn test_buffer_too_small() {
        let frame = Frame::new(CommunicationCode::Key, &[1, 2, 3]).unwrap();
        let mut out = [0u8; 6];
        assert_eq!(frame.encode(&mut out), Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(
            Frame::new(CommunicationCode::MessageFromRuntime, &payload),
            Err(FrameError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_parser_skips_noise() {
        let frame = Frame::new(CommunicationCode::Pin, &[7, 1]).unwrap();
        let mut stream = Vec::<u8, 32>::new();
        stream.extend_from_slice(&[0x00, 0x13, 0x37]).unwrap();
        stream.extend_from_slice(&frame.to_bytes()).unwrap();

        let mut parser = FrameParser::new();
        let (parsed, used) = parser.push_slice(&stream);
        assert_eq!(parsed, Ok(Some(frame)));
        assert_eq!(used, stream.len());
        assert!(!parser.in_frame());
    }

    #[test]
    fn test_parser_leaves_trailing_bytes() {
        let a = Frame::empty(CommunicationCode::AllGood).to_bytes();
        let b = Frame::empty(CommunicationCode::FatalError).to_bytes();
        let mut stream = Vec::<u8, 16>::new();
        stream.extend_from_slice(&a).unwrap();
        stream.extend_from_slice(&b).unwrap();

        let mut parser = FrameParser::new();
        let (first, used) = parser.push_slice(&stream);
        assert_eq!(first.unwrap().unwrap().code(), Some(CommunicationCode::AllGood));
        let (second, _) = parser.push_slice(&stream[used..]);
        assert_eq!(second.unwrap().unwrap().code(), Some(CommunicationCode::FatalError));
    }

    #[test]
    fn test_parser_checksum_and_resync() {
        let mut bad = Frame::new(CommunicationCode::Key, &[1]).unwrap().to_bytes();
        let last = bad.len() - 1;
        bad[last] ^= 0x55;

        let mut parser = FrameParser::new();
        let (result, _) = parser.push_slice(&bad);
        assert_eq!(result, Err(FrameError::InvalidChecksum));

        let good = Frame::empty(CommunicationCode::AllGood).to_bytes();
        let (result, _) = parser.push_slice(&good);
        assert!(result.unwrap().is_some());
    }

    #[test]
    fn test_parser_rejects_length() {
        let mut parser = FrameParser::new();
        parser.push(FRAME_START).unwrap();
        assert_eq!(parser.push(251), Err(FrameError::InvalidLength(251)));
        assert!(!parser.in_frame());
    }

    #[test]
    fn test_unknown_code_still_parses() {
        let frame = Frame::from_raw(99, &[]).unwrap();
        let mut parser = FrameParser::new();
        let (parsed, _) = parser.push_slice(&frame.to_bytes());
        let parsed = parsed.unwrap().unwrap();
        assert_eq!(parsed.code_byte(), 99);
        assert_eq!(parsed.code(), None);
    }

    proptest! {
        #[test]
        fn prop_parser_recovers_every_frame(
            code in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_SIZE),
        ) {
            let frame = Frame::from_raw(code, &payload).unwrap();
            let mut parser = FrameParser::new();
            let (parsed, used) = parser.push_slice(&frame.to_bytes());
            prop_assert_eq!(parsed, Ok(Some(frame.clone())));
            prop_assert_eq!(used, frame.encoded_len());
        }
    }
}
