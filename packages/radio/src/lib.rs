//! AT command engine for Reyax RYLR LoRa modules.
//!
//! The module speaks CRLF-terminated ASCII lines over a serial port. Commands
//! are answered with a single response line, while messages arriving over the
//! air show up as unsolicited `+RCV=` lines at any time, including between a
//! command and its response. [`engine::LineProtocolEngine`] sorts the two apart
//! and hands received messages to a [`engine::LineHandler`].

pub mod codec;
pub mod command;
pub mod engine;
pub mod error;
pub mod receiver;
pub mod serial;
pub mod transmitter;

pub use command::{AtCommand, CommandQueue, RadioSettings};
pub use engine::{LineHandler, LineProtocolEngine};
pub use error::ProtocolError;
