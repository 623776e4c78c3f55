//! UseCase: ack の中継
//!
//! doorclient から届いた ack を、アンロックを要求した webclient セッションの
//! outbox に積む。final の ack で pending-ack を削除する（2 回目以降は何もしない）。

use std::sync::Arc;

use doorbridge_shared::wire::WireMessage;

use crate::domain::{AckRouting, ConnectionRole, HubRepository, MessageId};

use super::error::DoorclientMessageError;

/// ack 中継のユースケース
pub struct RecordAckUseCase {
    repository: Arc<dyn HubRepository>,
}

impl RecordAckUseCase {
    pub fn new(repository: Arc<dyn HubRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        role: &ConnectionRole,
        message_id: String,
        is_final: bool,
        body: String,
    ) -> Result<AckRouting, DoorclientMessageError> {
        if *role != ConnectionRole::Doorclient {
            return Err(DoorclientMessageError::NotDoorclient(role.label()));
        }

        let payload = WireMessage::ack(message_id.clone(), is_final, body)
            .to_json()
            .map_err(|e| DoorclientMessageError::Encode(e.to_string()))?;
        let message_id = MessageId::from_wire(message_id);
        let routing = self
            .repository
            .record_ack(&message_id, is_final, payload)
            .await?;

        match routing {
            AckRouting::Queued(session) => {
                tracing::info!("Queued ack {} (final={}) for {}", message_id, is_final, session);
            }
            AckRouting::Unknown => {
                tracing::debug!("Ignoring ack with no pending origin: {}", message_id);
            }
        }
        Ok(routing)
    }
}
