//! Serial port access for the radio module.

use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    time::{sleep, timeout},
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::ProtocolError;

const SETTLE_TIME: Duration = Duration::from_secs(1);
const DRAIN_WAIT: Duration = Duration::from_millis(50);

/// Open `device`, poke the module with a bare `AT` and throw away whatever it
/// had buffered, so the first queued command sees a clean stream.
pub async fn open_radio(device: &str, baud: u32) -> Result<SerialStream, ProtocolError> {
    let mut stream = tokio_serial::new(device, baud)
        .timeout(Duration::from_millis(100))
        .open_native_async()?;
    tracing::info!("Opened radio on {} at {} baud", device, baud);

    stream.write_all(b"AT\r\n").await?;
    stream.flush().await?;
    sleep(SETTLE_TIME).await;

    let mut buf = [0u8; 256];
    let mut drained = 0;
    while let Ok(Ok(n)) = timeout(DRAIN_WAIT, stream.read(&mut buf)).await {
        if n == 0 {
            break;
        }
        drained += n;
    }
    tracing::debug!("Drained {} stale bytes from {}", drained, device);

    Ok(stream)
}
