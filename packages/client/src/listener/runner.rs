//! Reconnect loop around the hub session.

use tokio::sync::mpsc;

use crate::{
    config::ListenerSettings,
    error::{ClientError, WorkerError},
    events::Outbound,
};

use super::{dispatcher::UnlockDispatcher, session::run_listener_session};

/// Keep a hub session alive forever.
///
/// Transport faults are logged and followed by a reconnect after
/// `reconnect_delay`; only a local worker failure ends the loop.
pub async fn run_listener(
    settings: ListenerSettings,
    dispatcher: UnlockDispatcher,
    mut outbound: mpsc::Receiver<Outbound>,
) -> Result<(), WorkerError> {
    tracing::info!(worker = "listener", "Starting unlock listener");
    loop {
        match run_listener_session(&settings, &dispatcher, &mut outbound).await {
            Ok(()) => tracing::info!(worker = "listener", "Hub session ended"),
            Err(ClientError::Worker(e)) => return Err(e),
            Err(e) => tracing::warn!(worker = "listener", "Hub connection lost: {}", e),
        }

        tracing::info!(
            worker = "listener",
            "Reconnecting in {:?}",
            settings.reconnect_delay
        );
        tokio::time::sleep(settings.reconnect_delay).await;
    }
}
