//! UseCase: ブロードキャスト
//!
//! doorclient からの通知を、接続中の webclient に 30 秒間配信するために保存する。

use std::sync::Arc;

use doorbridge_shared::{time::Clock, wire::WireMessage};

use crate::domain::{ConnectionRole, HubRepository, Timestamp};

use super::error::DoorclientMessageError;

/// ブロードキャストのユースケース
pub struct BroadcastUseCase {
    repository: Arc<dyn HubRepository>,
    clock: Arc<dyn Clock>,
}

impl BroadcastUseCase {
    pub fn new(repository: Arc<dyn HubRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn execute(
        &self,
        role: &ConnectionRole,
        body: String,
    ) -> Result<(), DoorclientMessageError> {
        if *role != ConnectionRole::Doorclient {
            return Err(DoorclientMessageError::NotDoorclient(role.label()));
        }
        let payload = WireMessage::broadcast(body)
            .to_json()
            .map_err(|e| DoorclientMessageError::Encode(e.to_string()))?;
        self.repository
            .add_broadcast(payload, Timestamp::new(self.clock.now_millis()))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use doorbridge_shared::time::FixedClock;

    use super::*;
    use crate::infrastructure::repository::InMemoryHubRepository;

    #[tokio::test]
    async fn test_broadcast_only_from_doorclient() {
        // テスト項目: doorclient からのみブロードキャストを作成できる
        // given (前提条件):
        let repository = Arc::new(InMemoryHubRepository::default());
        let usecase = BroadcastUseCase::new(repository.clone(), Arc::new(FixedClock::new(0)));

        // when (操作):
        let rejected = usecase
            .execute(&ConnectionRole::Unidentified, "hi".to_string())
            .await;
        let accepted = usecase
            .execute(&ConnectionRole::Doorclient, "hi".to_string())
            .await;

        // then (期待する結果):
        assert_eq!(
            rejected,
            Err(DoorclientMessageError::NotDoorclient("unidentified"))
        );
        assert_eq!(accepted, Ok(()));
        assert_eq!(repository.snapshot().await.broadcasts, 1);
    }
}
