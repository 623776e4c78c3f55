//! UseCase 層
//!
//! WebSocket ハンドラから呼ばれるハブの操作を定義します。

mod broadcast;
mod error;
mod identify;
mod idle_poll;
mod record_ack;
mod request_unlock;
mod session;

pub use broadcast::BroadcastUseCase;
pub use error::{DoorclientMessageError, IdentifyError, RequestUnlockError};
pub use identify::{IdentifyConnectionUseCase, IdentifyRequest};
pub use idle_poll::IdlePollUseCase;
pub use record_ack::RecordAckUseCase;
pub use request_unlock::RequestUnlockUseCase;
pub use session::SessionUseCase;
