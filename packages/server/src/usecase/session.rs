//! UseCase: セッションの開始と終了

use std::sync::Arc;

use crate::domain::{HubRepository, HubSnapshot, RepositoryError, SessionId};

/// セッション管理のユースケース
pub struct SessionUseCase {
    repository: Arc<dyn HubRepository>,
}

impl SessionUseCase {
    pub fn new(repository: Arc<dyn HubRepository>) -> Self {
        Self { repository }
    }

    /// 新しいセッションを登録し、その ID を返す
    pub async fn open(&self) -> Result<SessionId, RepositoryError> {
        let session = SessionId::generate();
        self.repository.open_session(session).await?;
        Ok(session)
    }

    /// セッションを終了し、配送待ちの ack を破棄する
    pub async fn close(&self, session: &SessionId) -> Result<(), RepositoryError> {
        self.repository.close_session(session).await
    }

    /// ハブの状態（`/api/status` 用）
    pub async fn status(&self) -> HubSnapshot {
        self.repository.snapshot().await
    }
}
