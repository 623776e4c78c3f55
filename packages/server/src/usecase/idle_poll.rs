//! UseCase: アイドル時のポーリング
//!
//! 受信待ちがタイムアウトするたびに呼ばれ、その接続へ送るべきフレームを返す。
//!
//! - 失効したブロードキャストを削除する
//! - doorclient には送信待ちのアンロック指示を渡す
//! - webclient には ack outbox と未配信のブロードキャストを渡す

use std::sync::Arc;

use doorbridge_shared::time::Clock;

use crate::domain::{ConnectionRole, HubRepository, RepositoryError, SessionId, Timestamp};

/// アイドルポーリングのユースケース
pub struct IdlePollUseCase {
    repository: Arc<dyn HubRepository>,
    /// doorclient 宛ての指示に付与するシークレット
    secret: String,
    clock: Arc<dyn Clock>,
}

impl IdlePollUseCase {
    pub fn new(repository: Arc<dyn HubRepository>, secret: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            secret,
            clock,
        }
    }

    /// 送信すべきフレーム（JSON 文字列）を順に返す
    pub async fn execute(
        &self,
        session: &SessionId,
        role: &ConnectionRole,
    ) -> Result<Vec<String>, RepositoryError> {
        let now = Timestamp::new(self.clock.now_millis());
        let pruned = self.repository.prune_broadcasts(now).await?;
        if pruned > 0 {
            tracing::debug!("Pruned {} expired broadcasts", pruned);
        }

        match role {
            ConnectionRole::Unidentified => Ok(Vec::new()),
            ConnectionRole::Doorclient => {
                let Some(instruction) = self.repository.take_staged_unlock().await? else {
                    return Ok(Vec::new());
                };
                match instruction.to_wire(&self.secret).to_json() {
                    Ok(frame) => {
                        tracing::info!(
                            "Dispatching unlock {} for door {} to doorclient {}",
                            instruction.message_id,
                            instruction.door.value(),
                            session
                        );
                        Ok(vec![frame])
                    }
                    Err(e) => {
                        tracing::error!("Failed to encode unlock instruction: {}", e);
                        Ok(Vec::new())
                    }
                }
            }
            ConnectionRole::Webclient(_) => self.repository.drain_for_session(session, now).await,
        }
    }
}
