//! Error types for the door controller.

use doorbridge_radio::ProtocolError;
use doorbridge_shared::{gpio::GpioError, wire::WireError};
use thiserror::Error;

/// Why a hub session ended.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect, DNS or websocket failure. The listener reconnects.
    #[error("connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),

    /// The hub closed the connection.
    #[error("connection closed by hub")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] WireError),

    /// Failure that ends the listener worker.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Failure of the telephony console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to start console {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("console exited")]
    Exited,

    #[error("console did not show {pattern:?} in time")]
    Unresponsive { pattern: String },
}

/// A failure that terminates a worker, and with it the whole controller.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {0} stopped")]
    Stopped(String),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Radio(#[from] ProtocolError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid door spec {0:?}; expected a gpio pin number or radio:<address>")]
    InvalidDoorSpec(String),

    #[error("at least one --door is required")]
    NoDoors,

    #[error("door {0} has no output pin")]
    MissingDoorPin(usize),

    #[error("radio doors are configured but no radio device is open")]
    MissingRadio,
}
