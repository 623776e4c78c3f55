//! Controller side of the radio link.
//!
//! Turns unlock requests from the controller into `AT+SEND` commands and
//! reports relock confirmations coming back from door receivers.

use tokio::sync::mpsc::{
    self,
    error::{TryRecvError, TrySendError},
};

use crate::{
    codec::ReceivedMessage,
    command::{AtCommand, CommandQueue, RELOCKED_PAYLOAD, UNLOCK_PAYLOAD},
    engine::LineHandler,
    error::ProtocolError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioRequest {
    /// Ask the receiver at `address` to unlock its door
    Unlock { address: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// The receiver at `address` reported its door relocked
    Relocked { address: u16 },
}

pub struct ReyaxTransmitter {
    requests: mpsc::Receiver<RadioRequest>,
    events: mpsc::Sender<RadioEvent>,
}

impl ReyaxTransmitter {
    pub fn new(requests: mpsc::Receiver<RadioRequest>, events: mpsc::Sender<RadioEvent>) -> Self {
        Self { requests, events }
    }
}

impl LineHandler for ReyaxTransmitter {
    fn handle_message(
        &mut self,
        message: &ReceivedMessage,
        _commands: &mut CommandQueue,
    ) -> Result<(), ProtocolError> {
        tracing::info!(
            worker = "radio",
            "Received {:?} from {} (rssi {}, snr {})",
            message.payload,
            message.address,
            message.rssi,
            message.snr
        );
        if message.payload != RELOCKED_PAYLOAD {
            return Ok(());
        }

        match self.events.try_send(RadioEvent::Relocked {
            address: message.address,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                tracing::warn!(worker = "radio", "Event queue full, dropping {:?}", event);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ProtocolError::ChannelClosed("radio event")),
        }
    }

    fn manage_state(&mut self, commands: &mut CommandQueue) -> Result<(), ProtocolError> {
        loop {
            match self.requests.try_recv() {
                Ok(RadioRequest::Unlock { address }) => {
                    tracing::info!(worker = "radio", "Asking receiver {} to unlock", address);
                    commands.push(AtCommand::send(address, UNLOCK_PAYLOAD));
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(ProtocolError::ChannelClosed("radio request"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(address: u16, payload: &str) -> ReceivedMessage {
        ReceivedMessage {
            address,
            payload: payload.to_string(),
            rssi: -50,
            snr: 10,
        }
    }

    #[test]
    fn test_unlock_requests_become_send_commands() {
        // テスト項目: アンロック要求が AT+SEND コマンドとして積まれる
        // given (前提条件):
        let (request_tx, request_rx) = mpsc::channel(4);
        let (event_tx, _event_rx) = mpsc::channel(4);
        let mut transmitter = ReyaxTransmitter::new(request_rx, event_tx);
        let mut commands = CommandQueue::new();
        request_tx.try_send(RadioRequest::Unlock { address: 1 }).unwrap();
        request_tx.try_send(RadioRequest::Unlock { address: 3 }).unwrap();

        // when (操作):
        transmitter.manage_state(&mut commands).unwrap();

        // then (期待する結果):
        assert_eq!(commands.pop(), Some(AtCommand::send(1, "80F")));
        assert_eq!(commands.pop(), Some(AtCommand::send(3, "80F")));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_relocked_message_is_reported() {
        // テスト項目: 79F を受信すると再施錠イベントが通知され、それ以外は無視される
        // given (前提条件):
        let (_request_tx, request_rx) = mpsc::channel(4);
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let mut transmitter = ReyaxTransmitter::new(request_rx, event_tx);
        let mut commands = CommandQueue::new();

        // when (操作):
        transmitter
            .handle_message(&message(1, "HELLO"), &mut commands)
            .unwrap();
        transmitter
            .handle_message(&message(1, "79F"), &mut commands)
            .unwrap();

        // then (期待する結果):
        assert_eq!(event_rx.try_recv(), Ok(RadioEvent::Relocked { address: 1 }));
        assert!(event_rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_request_channel_is_fatal() {
        // テスト項目: 要求チャネルが閉じるとエラーになる
        // given (前提条件):
        let (request_tx, request_rx) = mpsc::channel::<RadioRequest>(4);
        let (event_tx, _event_rx) = mpsc::channel(4);
        let mut transmitter = ReyaxTransmitter::new(request_rx, event_tx);
        drop(request_tx);

        // when (操作):
        let result = transmitter.manage_state(&mut CommandQueue::new());

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::ChannelClosed(_))));
    }
}
