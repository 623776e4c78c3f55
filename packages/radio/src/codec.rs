//! Line framing and `+RCV` notification parsing.

use crate::error::ProtocolError;

/// Prefix of an unsolicited over-the-air message.
pub const RECEIVE_PREFIX: &str = "+RCV=";

/// Longest unterminated line kept in the framer.
pub const MAX_LINE: usize = 512;

/// Splits a byte stream into lines.
///
/// Carriage returns are dropped wherever they appear; a line ends at LF.
/// Partial lines stay buffered until the rest arrives. A partial line
/// growing past [`MAX_LINE`] is discarded.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(128),
        }
    }

    /// Push raw bytes into the buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer
            .extend(data.iter().copied().filter(|byte| *byte != b'\r'));

        let line_start = self
            .buffer
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map_or(0, |end| end + 1);
        let partial = self.buffer.len() - line_start;
        if partial > MAX_LINE {
            tracing::warn!("Discarding {} bytes of unterminated input", partial);
            self.buffer.truncate(line_start);
        }
    }

    /// Extract the next complete line, without its terminator
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// Bytes buffered after the last complete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// A message received over the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub address: u16,
    pub payload: String,
    pub rssi: i32,
    pub snr: i32,
}

impl ReceivedMessage {
    /// Parse `+RCV=<address>,<len>,<payload>,<rssi>,<snr>`.
    ///
    /// The payload is exactly `len` bytes and may itself contain commas.
    /// Returns `Ok(None)` for lines without the receive prefix.
    pub fn parse(line: &str) -> Result<Option<Self>, ProtocolError> {
        let Some(body) = line.strip_prefix(RECEIVE_PREFIX) else {
            return Ok(None);
        };
        let malformed = || ProtocolError::MalformedReceive(line.to_string());

        let mut fields = body.splitn(3, ',');
        let address = fields
            .next()
            .and_then(|field| field.trim().parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let len = fields
            .next()
            .and_then(|field| field.trim().parse::<usize>().ok())
            .ok_or_else(malformed)?;
        let rest = fields.next().ok_or_else(malformed)?;

        let payload = rest.get(..len).ok_or_else(malformed)?;
        let (rssi, snr) = rest
            .get(len..)
            .and_then(|tail| tail.strip_prefix(','))
            .and_then(|tail| tail.split_once(','))
            .ok_or_else(malformed)?;

        Ok(Some(Self {
            address,
            payload: payload.to_string(),
            rssi: rssi.trim().parse().map_err(|_| malformed())?,
            snr: snr.trim().parse().map_err(|_| malformed())?,
        }))
    }
}
