//! Server state shared by every connection.

use std::sync::Arc;

use crate::usecase::{
    BroadcastUseCase, IdentifyConnectionUseCase, IdlePollUseCase, RecordAckUseCase,
    RequestUnlockUseCase, SessionUseCase,
};

/// Shared application state
pub struct AppState {
    /// IdentifyConnectionUseCase（接続識別のユースケース）
    pub identify_usecase: Arc<IdentifyConnectionUseCase>,
    /// RequestUnlockUseCase（アンロック要求のユースケース）
    pub request_unlock_usecase: Arc<RequestUnlockUseCase>,
    /// RecordAckUseCase（ack 中継のユースケース）
    pub record_ack_usecase: Arc<RecordAckUseCase>,
    /// BroadcastUseCase（ブロードキャストのユースケース）
    pub broadcast_usecase: Arc<BroadcastUseCase>,
    /// IdlePollUseCase（アイドルポーリングのユースケース）
    pub idle_poll_usecase: Arc<IdlePollUseCase>,
    /// SessionUseCase（セッション管理のユースケース）
    pub session_usecase: Arc<SessionUseCase>,
}
