//! AT commands understood by the Reyax module.

use std::collections::VecDeque;

use crate::error::ProtocolError;

/// Generic success response
pub const OK: &str = "+OK";
/// Payload asking the door receiver to unlock
pub const UNLOCK_PAYLOAD: &str = "80F";
/// Payload the door receiver sends once it has relocked
pub const RELOCKED_PAYLOAD: &str = "79F";

const CRLF: &[u8] = b"\r\n";

/// One command line and the response it must get.
///
/// An empty `expect` accepts any response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    pub text: String,
    pub expect: String,
}

impl AtCommand {
    pub fn new(text: impl Into<String>, expect: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expect: expect.into(),
        }
    }

    /// Bare `AT`, used to flush whatever the module had pending.
    pub fn attention() -> Self {
        Self::new("AT", "")
    }

    pub fn band(hz: u32) -> Self {
        Self::new(format!("AT+BAND={hz}"), OK)
    }

    pub fn network_id(id: u8) -> Self {
        Self::new(format!("AT+NETWORKID={id}"), OK)
    }

    pub fn baud(baud: u32) -> Self {
        Self::new(format!("AT+IPR={baud}"), format!("+IPR={baud}"))
    }

    pub fn address(address: u16) -> Self {
        Self::new(format!("AT+ADDRESS={address}"), OK)
    }

    /// Transmit `payload` to the module at `address`.
    pub fn send(address: u16, payload: &str) -> Self {
        Self::new(
            format!("AT+SEND={address},{},{payload}", payload.len()),
            OK,
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.text.len() + CRLF.len());
        bytes.extend_from_slice(self.text.as_bytes());
        bytes.extend_from_slice(CRLF);
        bytes
    }

    /// Compare a response line against the expectation.
    pub fn check_response(&self, line: String) -> Result<String, ProtocolError> {
        if !self.expect.is_empty() && line != self.expect {
            return Err(ProtocolError::Mismatch {
                command: self.text.clone(),
                expected: self.expect.clone(),
                got: line,
            });
        }
        Ok(line)
    }
}

/// FIFO of commands waiting to be written.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<AtCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: AtCommand) {
        self.commands.push_back(command);
    }

    pub fn pop(&mut self) -> Option<AtCommand> {
        self.commands.pop_front()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Extend<AtCommand> for CommandQueue {
    fn extend<I: IntoIterator<Item = AtCommand>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

/// Radio parameters shared by both ends of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSettings {
    /// Carrier frequency in Hz
    pub band: u32,
    /// Network number; door and apartment must match
    pub network_id: u8,
    pub baud: u32,
    /// This module's address (1: door, 2: apartment)
    pub address: u16,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            band: 915_000_000,
            network_id: 18,
            baud: 115_200,
            address: 2,
        }
    }
}

impl RadioSettings {
    /// Commands that bring a freshly opened module into this configuration.
    pub fn setup_commands(&self) -> Vec<AtCommand> {
        vec![
            AtCommand::attention(),
            AtCommand::band(self.band),
            AtCommand::network_id(self.network_id),
            AtCommand::baud(self.baud),
            AtCommand::address(self.address),
        ]
    }
}
