//! InMemory Hub Repository 実装
//!
//! ドメイン層が定義する HubRepository trait の具体的な実装。
//! `HubState` 集約を 1 つの Mutex で保護します。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    AckRouting, HubRepository, HubSnapshot, HubState, MessageId, RepositoryError, SessionId,
    Timestamp, UnlockInstruction,
};

/// インメモリ Hub Repository 実装
#[derive(Clone, Default)]
pub struct InMemoryHubRepository {
    state: Arc<Mutex<HubState>>,
}

impl InMemoryHubRepository {
    pub fn new(state: Arc<Mutex<HubState>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl HubRepository for InMemoryHubRepository {
    async fn open_session(&self, session: SessionId) -> Result<(), RepositoryError> {
        self.state.lock().await.open_session(session);
        Ok(())
    }

    async fn close_session(&self, session: &SessionId) -> Result<(), RepositoryError> {
        self.state.lock().await.close_session(session);
        Ok(())
    }

    async fn stage_unlock(
        &self,
        instruction: UnlockInstruction,
        origin: SessionId,
    ) -> Result<Option<UnlockInstruction>, RepositoryError> {
        Ok(self.state.lock().await.stage_unlock(instruction, origin))
    }

    async fn take_staged_unlock(&self) -> Result<Option<UnlockInstruction>, RepositoryError> {
        Ok(self.state.lock().await.take_staged_unlock())
    }

    async fn record_ack(
        &self,
        message_id: &MessageId,
        is_final: bool,
        payload: String,
    ) -> Result<AckRouting, RepositoryError> {
        Ok(self
            .state
            .lock()
            .await
            .record_ack(message_id, is_final, payload))
    }

    async fn add_broadcast(&self, payload: String, now: Timestamp) -> Result<(), RepositoryError> {
        self.state.lock().await.add_broadcast(payload, now);
        Ok(())
    }

    async fn prune_broadcasts(&self, now: Timestamp) -> Result<usize, RepositoryError> {
        Ok(self.state.lock().await.prune_broadcasts(now))
    }

    async fn drain_for_session(
        &self,
        session: &SessionId,
        now: Timestamp,
    ) -> Result<Vec<String>, RepositoryError> {
        let mut state = self.state.lock().await;
        let mut frames = state.drain_outbox(session);
        frames.extend(state.collect_broadcasts(session, now));
        Ok(frames)
    }

    async fn snapshot(&self) -> HubSnapshot {
        self.state.lock().await.snapshot()
    }
}
