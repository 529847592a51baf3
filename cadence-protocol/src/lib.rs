//! Remote Key Protocol
//!
//! Wire format for delivering key events and control messages to the
//! runtime over any byte stream (TCP, serial, pipe). The transport itself
//! is out of scope; this crate only frames and decodes.
//!
//! # Frame Layout
//!
//! ```text
//! ┌───────┬────────┬──────┬─────────────┬──────────┐
//! │ START │ LENGTH │ CODE │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B     │ 1B   │ 0–250B      │ 1B       │
//! └───────┴────────┴──────┴─────────────┴──────────┘
//! ```
//!
//! `CODE` is a [`CommunicationCode`]. Control codes (0-59) carry either no
//! payload or UTF-8 text; item codes (60+) carry a postcard-encoded
//! message.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod codes;
pub mod frame;
pub mod messages;

pub use codes::{CommunicationCode, RebootTarget};
pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_PAYLOAD_SIZE};
pub use messages::{KeyMessage, MessageError, PinMessage, RemoteMessage, MAX_TEXT_LEN};
