//! WebSocket connection handler.
//!
//! Each connection runs in one task. The task waits for the next frame with a
//! short timeout; every timeout is an idle poll that flushes whatever the hub
//! holds for this connection.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use doorbridge_shared::wire::WireMessage;
use tokio::time::{Instant, timeout};

use crate::{
    domain::{ConnectionRole, SessionId},
    ui::state::AppState,
    usecase::IdentifyRequest,
};

/// Receive timeout; each expiry triggers an idle poll.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// A keepalive pong is sent after this long without traffic.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let session = match state.session_usecase.open().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to open session: {}", e);
            return;
        }
    };
    tracing::info!("Session {} connected", session);

    let mut role = ConnectionRole::Unidentified;
    let mut last_activity = Instant::now();

    loop {
        match timeout(IDLE_POLL_INTERVAL, socket.recv()).await {
            Ok(Some(Ok(message))) => {
                last_activity = Instant::now();
                match message {
                    Message::Text(text) => {
                        handle_text(&state, session, &mut role, text.as_str()).await;
                    }
                    Message::Close(_) => {
                        tracing::info!("Session {} requested close", session);
                        break;
                    }
                    Message::Binary(_) => {
                        tracing::debug!("Ignoring binary frame from {}", session);
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            Ok(Some(Err(e))) => {
                tracing::warn!("WebSocket error on session {}: {}", session, e);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                if !flush_idle(&mut socket, &state, session, &role).await {
                    break;
                }
                if last_activity.elapsed() >= KEEPALIVE_INTERVAL {
                    if socket.send(Message::Pong(Bytes::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!("Sent keepalive to {}", session);
                    last_activity = Instant::now();
                }
            }
        }
    }

    if let Err(e) = state.session_usecase.close(&session).await {
        tracing::warn!("Failed to close session {}: {}", session, e);
    }
    tracing::info!("Session {} ({}) disconnected", session, role.label());
}

/// Send everything the hub holds for this session. Returns `false` once the
/// socket is gone.
async fn flush_idle(
    socket: &mut WebSocket,
    state: &AppState,
    session: SessionId,
    role: &ConnectionRole,
) -> bool {
    let frames = match state.idle_poll_usecase.execute(&session, role).await {
        Ok(frames) => frames,
        Err(e) => {
            tracing::error!("Idle poll failed for {}: {}", session, e);
            return true;
        }
    };
    for frame in frames {
        if let Err(e) = socket.send(Message::Text(frame.into())).await {
            tracing::warn!("Failed to send to {}: {}", session, e);
            return false;
        }
    }
    true
}

async fn handle_text(state: &AppState, session: SessionId, role: &mut ConnectionRole, text: &str) {
    let message = match WireMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Dropping frame from {}: {}", session, e);
            return;
        }
    };

    match message {
        WireMessage::Identification {
            body,
            secret,
            user,
            token,
        } => {
            let request = IdentifyRequest {
                role: body,
                secret,
                user,
                token,
            };
            match state.identify_usecase.execute(role, request) {
                Ok(identified) => {
                    tracing::info!("Session {} identified as {}", session, identified.label());
                    *role = identified;
                }
                Err(e) => tracing::warn!("Identification failed for {}: {}", session, e),
            }
        }
        WireMessage::Unlock { body, doornum, .. } => {
            if let Err(e) = state
                .request_unlock_usecase
                .execute(session, role, &body, doornum)
                .await
            {
                tracing::warn!("Unlock request from {} rejected: {}", session, e);
            }
        }
        WireMessage::Ack {
            msgid,
            is_final,
            body,
        } => {
            if let Err(e) = state
                .record_ack_usecase
                .execute(role, msgid, is_final, body)
                .await
            {
                tracing::warn!("Ack from {} rejected: {}", session, e);
            }
        }
        WireMessage::Broadcast { body } => {
            if let Err(e) = state.broadcast_usecase.execute(role, body).await {
                tracing::warn!("Broadcast from {} rejected: {}", session, e);
            }
        }
    }
}
