//! ドメイン層
//!
//! ハブの状態（セッション、アンロック指示、ack、ブロードキャスト）と、
//! 外部に依存するインターフェース（認証情報ストア、Repository）を定義します。

mod credentials;
mod entity;
mod hub;
mod repository;
mod value_object;

pub use credentials::CredentialStore;
#[cfg(test)]
pub use credentials::MockCredentialStore;
pub use entity::{BROADCAST_TTL_MILLIS, Broadcast, ConnectionRole, UnlockInstruction, UserRecord};
pub use hub::{AckRouting, HubSnapshot, HubState};
pub use repository::HubRepository;
pub use value_object::{DoorIndex, MessageId, SessionId, Timestamp, UserName};

use thiserror::Error;

/// Value Object の生成エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("user name must not be empty")]
    EmptyUserName,
}

/// Repository 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("hub state is unavailable: {0}")]
    Unavailable(String),
}
