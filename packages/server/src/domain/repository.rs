//! Repository trait 定義
//!
//! ハブの共有状態へのアクセスを抽象化します。
//! UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。

use async_trait::async_trait;

use super::{
    AckRouting, HubSnapshot, MessageId, RepositoryError, SessionId, Timestamp, UnlockInstruction,
};

/// Hub Repository trait
///
/// pending-ack、ack outbox、ブロードキャストの 3 つを 1 つの排他単位として扱う。
#[async_trait]
pub trait HubRepository: Send + Sync {
    /// セッションを登録
    async fn open_session(&self, session: SessionId) -> Result<(), RepositoryError>;

    /// セッションを削除（outbox も破棄する）
    async fn close_session(&self, session: &SessionId) -> Result<(), RepositoryError>;

    /// アンロック指示を送信待ちにし、上書きされた指示を返す
    async fn stage_unlock(
        &self,
        instruction: UnlockInstruction,
        origin: SessionId,
    ) -> Result<Option<UnlockInstruction>, RepositoryError>;

    /// 送信待ちのアンロック指示を取り出す
    async fn take_staged_unlock(&self) -> Result<Option<UnlockInstruction>, RepositoryError>;

    /// ack を依頼元セッションへ振り分ける
    async fn record_ack(
        &self,
        message_id: &MessageId,
        is_final: bool,
        payload: String,
    ) -> Result<AckRouting, RepositoryError>;

    /// ブロードキャストを追加
    async fn add_broadcast(&self, payload: String, now: Timestamp) -> Result<(), RepositoryError>;

    /// 失効したブロードキャストを削除
    async fn prune_broadcasts(&self, now: Timestamp) -> Result<usize, RepositoryError>;

    /// セッション宛ての ack と未配信のブロードキャストをまとめて取り出す
    async fn drain_for_session(
        &self,
        session: &SessionId,
        now: Timestamp,
    ) -> Result<Vec<String>, RepositoryError>;

    /// 状態のスナップショット
    async fn snapshot(&self) -> HubSnapshot;
}
