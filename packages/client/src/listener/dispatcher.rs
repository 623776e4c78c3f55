//! Routes unlock commands to the executor that owns the door.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{error::WorkerError, events::UnlockCommand};

#[derive(Debug, Clone)]
pub enum UnlockDispatcher {
    /// Queue `i` feeds the executor of door `i`
    PerDoor(Vec<mpsc::Sender<UnlockCommand>>),
    /// One executor serves all `doors`
    Shared {
        doors: usize,
        sender: mpsc::Sender<UnlockCommand>,
    },
}

impl UnlockDispatcher {
    /// Enqueue `command` without waiting.
    ///
    /// Returns `Ok(false)` when the command was dropped (unknown door or a
    /// full queue). A closed queue means the executor is gone.
    pub fn dispatch(&self, command: UnlockCommand) -> Result<bool, WorkerError> {
        let sender = match self {
            Self::PerDoor(senders) => senders.get(command.door),
            Self::Shared { doors, sender } => (command.door < *doors).then_some(sender),
        };
        let Some(sender) = sender else {
            tracing::warn!(worker = "listener", "No such door {}", command.door);
            return Ok(false);
        };

        match sender.try_send(command) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(command)) => {
                tracing::warn!(
                    worker = "listener",
                    "Unlock queue for door {} is full, dropping request",
                    command.door
                );
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(WorkerError::ChannelClosed("unlock")),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    fn command(door: usize) -> UnlockCommand {
        UnlockCommand {
            door,
            received_at: Instant::now(),
            msgid: None,
        }
    }

    #[tokio::test]
    async fn test_per_door_dispatch_routes_by_index() {
        // テスト項目: ドアごとの構成ではドア番号に対応するキューに送られる
        // given (前提条件):
        let (tx0, mut rx0) = mpsc::channel(1);
        let (tx1, mut rx1) = mpsc::channel(1);
        let dispatcher = UnlockDispatcher::PerDoor(vec![tx0, tx1]);

        // when (操作):
        let sent = dispatcher.dispatch(command(1)).unwrap();
        let unknown = dispatcher.dispatch(command(2)).unwrap();

        // then (期待する結果):
        assert!(sent);
        assert!(!unknown);
        assert_eq!(rx1.try_recv().unwrap().door, 1);
        assert!(rx0.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_closed_queue_fails() {
        // テスト項目: キューが満杯なら破棄し、閉じていればエラーになる
        // given (前提条件):
        let (sender, receiver) = mpsc::channel(1);
        let dispatcher = UnlockDispatcher::Shared { doors: 2, sender };
        dispatcher.dispatch(command(0)).unwrap();

        // when (操作):
        let full = dispatcher.dispatch(command(1)).unwrap();
        drop(receiver);
        let closed = dispatcher.dispatch(command(1));

        // then (期待する結果):
        assert!(!full);
        assert!(matches!(closed, Err(WorkerError::ChannelClosed("unlock"))));
    }
}
