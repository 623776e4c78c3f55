//! One connection to the hub.

use std::time::Duration;

use doorbridge_shared::wire::WireMessage;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, error::TryRecvError},
    time::{Instant, timeout},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Bytes, Message},
};

use crate::{
    config::ListenerSettings,
    error::{ClientError, WorkerError},
    events::{Outbound, UnlockCommand},
};

use super::{
    dispatcher::UnlockDispatcher,
    domain::{HubInstruction, interpret_frame},
};

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Longest wait for an inbound frame before running the idle work.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Connect, identify as the doorclient and serve until the connection fails.
///
/// Returns `ClientError::Worker` only when a local queue is gone; every other
/// error is a transport fault the caller recovers from by reconnecting.
pub async fn run_listener_session(
    settings: &ListenerSettings,
    dispatcher: &UnlockDispatcher,
    outbound: &mut mpsc::Receiver<Outbound>,
) -> Result<(), ClientError> {
    let (mut ws, _) = connect_async(settings.server.as_str()).await?;
    tracing::info!(worker = "listener", "Connected to {}", settings.server);

    send(&mut ws, &WireMessage::doorclient_identification(&settings.secret)).await?;
    tracing::info!(worker = "listener", "Sent identification");

    let mut last_keepalive = Instant::now();
    loop {
        match timeout(RECV_TIMEOUT, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                handle_text(&mut ws, settings, dispatcher, text.as_str()).await?;
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                tracing::info!(worker = "listener", "Hub closed the connection");
                return Err(ClientError::Closed);
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => return Err(e.into()),
            Err(_) => {
                flush_outbound(&mut ws, outbound).await?;
                if last_keepalive.elapsed() >= KEEPALIVE_INTERVAL {
                    ws.send(Message::Pong(Bytes::new())).await?;
                    last_keepalive = Instant::now();
                }
            }
        }
    }
}

async fn handle_text(
    ws: &mut HubStream,
    settings: &ListenerSettings,
    dispatcher: &UnlockDispatcher,
    text: &str,
) -> Result<(), ClientError> {
    let (requester, door, msgid) = match interpret_frame(text, &settings.secret) {
        HubInstruction::Unlock {
            requester,
            door,
            msgid,
        } => (requester, door, msgid),
        HubInstruction::Ignore(reason) => {
            tracing::debug!(worker = "listener", "Ignoring frame ({}): {}", reason, text);
            return Ok(());
        }
    };

    tracing::info!(
        worker = "listener",
        "Enqueueing unlock of door {} requested by {}",
        door,
        requester
    );
    let command = UnlockCommand {
        door,
        received_at: Instant::now(),
        msgid: msgid.clone(),
    };
    if dispatcher.dispatch(command)?
        && let Some(msgid) = msgid
    {
        let progress = WireMessage::ack(msgid, false, format!("enqueued unlock for door {door}"));
        send(ws, &progress).await?;
    }
    Ok(())
}

/// Forward everything the executors and the radio queued while we waited.
async fn flush_outbound(
    ws: &mut HubStream,
    outbound: &mut mpsc::Receiver<Outbound>,
) -> Result<(), ClientError> {
    loop {
        let message = match outbound.try_recv() {
            Ok(Outbound::Ack {
                msgid,
                is_final,
                body,
            }) => WireMessage::ack(msgid, is_final, body),
            Ok(Outbound::Broadcast(body)) => WireMessage::broadcast(body),
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => {
                return Err(WorkerError::ChannelClosed("outbound").into());
            }
        };
        send(ws, &message).await?;
    }
}

async fn send(ws: &mut HubStream, message: &WireMessage) -> Result<(), ClientError> {
    ws.send(Message::text(message.to_json()?)).await?;
    Ok(())
}
