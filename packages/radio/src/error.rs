use std::time::Duration;

use doorbridge_shared::gpio::GpioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("command {command:?} expected {expected:?}, got {got:?}")]
    Mismatch {
        command: String,
        expected: String,
        got: String,
    },

    #[error("no response to {command:?} within {timeout:?}")]
    ResponseTimeout { command: String, timeout: Duration },

    #[error("malformed receive notification {0:?}")]
    MalformedReceive(String),

    #[error("serial stream closed")]
    Closed,

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open serial port: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),
}
