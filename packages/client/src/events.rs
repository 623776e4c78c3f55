//! Messages passed between workers.

use tokio::time::Instant;

/// Unlock work for an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockCommand {
    pub door: usize,
    /// When the controller received the instruction
    pub received_at: Instant,
    /// Correlation id from the hub; `None` for locally triggered unlocks
    pub msgid: Option<String>,
}

/// A call button press that should page the apartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub requested_at: Instant,
}

/// Frames the listener forwards to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Ack {
        msgid: String,
        is_final: bool,
        body: String,
    },
    Broadcast(String),
}

/// Published by the executors for the page supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuationStatus {
    /// Paging must wait until this instant
    pub paging_suspended_until: Option<Instant>,
}

impl ActuationStatus {
    pub fn is_suspended(&self, now: Instant) -> bool {
        self.paging_suspended_until.is_some_and(|until| now < until)
    }
}
