//! UseCase: アンロック要求
//!
//! 識別済み webclient からの要求だけを受け付け、ドアの許可を確認したうえで
//! MessageId を割り当て、doorclient 宛ての指示として送信待ちにする。

use std::sync::Arc;

use doorbridge_shared::time::Clock;

use crate::domain::{
    ConnectionRole, CredentialStore, DoorIndex, HubRepository, MessageId, SessionId, Timestamp,
    UnlockInstruction,
};

use super::error::RequestUnlockError;

/// アンロック要求のユースケース
pub struct RequestUnlockUseCase {
    repository: Arc<dyn HubRepository>,
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl RequestUnlockUseCase {
    pub fn new(
        repository: Arc<dyn HubRepository>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            credentials,
            clock,
        }
    }

    /// アンロック要求を実行
    ///
    /// # Arguments
    ///
    /// * `session` - 要求元のセッション（ack の配送先）
    /// * `role` - 要求元セッションの役割
    /// * `claimed_user` - フレームの `body` に書かれたユーザー名
    /// * `door` - ドア番号
    ///
    /// # Returns
    ///
    /// * `Ok(MessageId)` - 割り当てた相関 ID
    pub async fn execute(
        &self,
        session: SessionId,
        role: &ConnectionRole,
        claimed_user: &str,
        door: usize,
    ) -> Result<MessageId, RequestUnlockError> {
        let ConnectionRole::Webclient(user) = role else {
            return Err(RequestUnlockError::NotWebclient);
        };
        // 認可には識別済みのユーザーを使う
        if !claimed_user.is_empty() && claimed_user != user.as_str() {
            return Err(RequestUnlockError::RequesterMismatch {
                claimed: claimed_user.to_string(),
                identified: user.to_string(),
            });
        }

        let door = DoorIndex::new(door);
        let record = self
            .credentials
            .lookup(user.as_str())
            .ok_or_else(|| RequestUnlockError::UnknownUser(user.to_string()))?;
        if !record.may_unlock(door) {
            return Err(RequestUnlockError::Unauthorized {
                user: user.to_string(),
                door: door.value(),
            });
        }

        let message_id = MessageId::generate();
        let instruction = UnlockInstruction {
            requester: user.clone(),
            door,
            message_id: message_id.clone(),
            issued_at: Timestamp::new(self.clock.now_millis()),
        };
        if let Some(replaced) = self.repository.stage_unlock(instruction, session).await? {
            tracing::warn!(
                "Undelivered unlock {} for door {} replaced by {}",
                replaced.message_id,
                replaced.door.value(),
                message_id
            );
        }
        tracing::info!(
            "Staged unlock {} for door {} requested by {}",
            message_id,
            door.value(),
            user
        );

        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use doorbridge_shared::time::FixedClock;

    use super::*;
    use crate::{
        domain::{MockCredentialStore, UserName, UserRecord},
        infrastructure::repository::InMemoryHubRepository,
    };

    fn setup() -> (RequestUnlockUseCase, Arc<InMemoryHubRepository>) {
        let mut store = MockCredentialStore::new();
        store.expect_lookup().returning(|user| {
            (user == "alice").then(|| UserRecord {
                password_hash: "hash".to_string(),
                doors: BTreeSet::from([0, 2]),
            })
        });
        let repository = Arc::new(InMemoryHubRepository::default());
        let usecase = RequestUnlockUseCase::new(
            repository.clone(),
            Arc::new(store),
            Arc::new(FixedClock::new(1_000)),
        );
        (usecase, repository)
    }

    fn alice() -> ConnectionRole {
        ConnectionRole::Webclient(UserName::new("alice".to_string()).unwrap())
    }

    #[tokio::test]
    async fn test_authorized_door_stages_one_instruction() {
        // テスト項目: 許可されたドアへの要求で指示が 1 件だけ送信待ちになる
        // given (前提条件):
        let (usecase, repository) = setup();
        let session = SessionId::generate();

        // when (操作):
        let message_id = usecase.execute(session, &alice(), "alice", 2).await.unwrap();

        // then (期待する結果):
        let staged = repository.take_staged_unlock().await.unwrap().unwrap();
        assert_eq!(staged.message_id, message_id);
        assert_eq!(staged.door, DoorIndex::new(2));
        assert_eq!(staged.issued_at, Timestamp::new(1_000));
        assert!(repository.take_staged_unlock().await.unwrap().is_none());
        assert_eq!(repository.snapshot().await.pending_acks, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_door_stages_nothing() {
        // テスト項目: 許可されていないドアへの要求では何も送信待ちにならない
        // given (前提条件):
        let (usecase, repository) = setup();

        // when (操作):
        let result = usecase
            .execute(SessionId::generate(), &alice(), "alice", 1)
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RequestUnlockError::Unauthorized {
                user: "alice".to_string(),
                door: 1
            })
        );
        assert!(repository.take_staged_unlock().await.unwrap().is_none());
        assert_eq!(repository.snapshot().await.pending_acks, 0);
    }

    #[tokio::test]
    async fn test_rejects_non_webclient_and_impersonation() {
        // テスト項目: 未識別の接続や他人の名前での要求は拒否される
        // given (前提条件):
        let (usecase, repository) = setup();

        // when (操作):
        let unidentified = usecase
            .execute(SessionId::generate(), &ConnectionRole::Unidentified, "alice", 0)
            .await;
        let doorclient = usecase
            .execute(SessionId::generate(), &ConnectionRole::Doorclient, "alice", 0)
            .await;
        let impersonation = usecase
            .execute(SessionId::generate(), &alice(), "bob", 0)
            .await;

        // then (期待する結果):
        assert_eq!(unidentified, Err(RequestUnlockError::NotWebclient));
        assert_eq!(doorclient, Err(RequestUnlockError::NotWebclient));
        assert!(matches!(
            impersonation,
            Err(RequestUnlockError::RequesterMismatch { .. })
        ));
        assert!(repository.take_staged_unlock().await.unwrap().is_none());
    }
}
