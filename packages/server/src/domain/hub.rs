//! ハブの集約（Aggregate）
//!
//! 全接続で共有する可変状態をひとつの構造体にまとめます。
//!
//! - 送信待ちのアンロック指示（最大 1 件。後から来た指示で上書きされる）
//! - pending-ack テーブル: `message_id → 依頼元セッション`
//! - ack outbox: セッションごとの FIFO
//! - ブロードキャスト一覧（30 秒で失効）
//!
//! 状態はプロセス内のみで保持し、再起動で失われる。

use std::collections::{HashMap, HashSet, VecDeque};

use super::{Broadcast, MessageId, SessionId, Timestamp, UnlockInstruction};

/// ack の振り分け結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckRouting {
    /// 依頼元セッションの outbox に追加した
    Queued(SessionId),
    /// 対応する pending-ack がない（final 済み、依頼元が切断済み、または未知の ID）
    Unknown,
}

/// 外部に公開する状態のスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HubSnapshot {
    pub sessions: usize,
    pub staged_unlock: bool,
    pub pending_acks: usize,
    pub queued_acks: usize,
    pub broadcasts: usize,
}

#[derive(Debug, Default)]
pub struct HubState {
    sessions: HashSet<SessionId>,
    staged_unlock: Option<UnlockInstruction>,
    pending_acks: HashMap<MessageId, SessionId>,
    ack_outbox: HashMap<SessionId, VecDeque<String>>,
    broadcasts: Vec<Broadcast>,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_session(&mut self, session: SessionId) {
        self.sessions.insert(session);
    }

    /// 切断されたセッションの outbox と pending-ack を破棄する
    pub fn close_session(&mut self, session: &SessionId) {
        self.sessions.remove(session);
        self.ack_outbox.remove(session);
        self.pending_acks.retain(|_, origin| origin != session);
        for broadcast in &mut self.broadcasts {
            broadcast.delivered_to.remove(session);
        }
    }

    /// アンロック指示を送信待ちにする
    ///
    /// 未送信の指示が残っていた場合は上書きし、上書きされた指示を返す。
    /// 上書きされた指示は doorclient に届かないので、その pending-ack も消す。
    pub fn stage_unlock(
        &mut self,
        instruction: UnlockInstruction,
        origin: SessionId,
    ) -> Option<UnlockInstruction> {
        if let Some(old) = &self.staged_unlock {
            self.pending_acks.remove(&old.message_id);
        }
        self.pending_acks
            .insert(instruction.message_id.clone(), origin);
        self.staged_unlock.replace(instruction)
    }

    pub fn take_staged_unlock(&mut self) -> Option<UnlockInstruction> {
        self.staged_unlock.take()
    }

    /// doorclient からの ack を依頼元セッションへ振り分ける
    ///
    /// `is_final` の場合は pending-ack を削除する。二度目の final は `Unknown`
    /// を返すだけで副作用はない。
    pub fn record_ack(&mut self, message_id: &MessageId, is_final: bool, payload: String) -> AckRouting {
        let origin = if is_final {
            self.pending_acks.remove(message_id)
        } else {
            self.pending_acks.get(message_id).copied()
        };

        match origin {
            Some(session) if self.sessions.contains(&session) => {
                self.ack_outbox.entry(session).or_default().push_back(payload);
                AckRouting::Queued(session)
            }
            _ => AckRouting::Unknown,
        }
    }

    pub fn add_broadcast(&mut self, payload: String, now: Timestamp) {
        self.broadcasts.push(Broadcast::new(payload, now));
    }

    /// 失効したブロードキャストを削除し、削除件数を返す
    pub fn prune_broadcasts(&mut self, now: Timestamp) -> usize {
        let before = self.broadcasts.len();
        self.broadcasts.retain(|broadcast| !broadcast.is_expired(now));
        before - self.broadcasts.len()
    }

    /// セッションの ack outbox を FIFO 順に取り出す
    pub fn drain_outbox(&mut self, session: &SessionId) -> Vec<String> {
        self.ack_outbox
            .remove(session)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// 未配信かつ有効なブロードキャストを取り出し、配信済みにする
    pub fn collect_broadcasts(&mut self, session: &SessionId, now: Timestamp) -> Vec<String> {
        self.broadcasts
            .iter_mut()
            .filter(|broadcast| !broadcast.is_expired(now))
            .filter_map(|broadcast| {
                broadcast
                    .delivered_to
                    .insert(*session)
                    .then(|| broadcast.payload.clone())
            })
            .collect()
    }

    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            sessions: self.sessions.len(),
            staged_unlock: self.staged_unlock.is_some(),
            pending_acks: self.pending_acks.len(),
            queued_acks: self.ack_outbox.values().map(VecDeque::len).sum(),
            broadcasts: self.broadcasts.len(),
        }
    }
}
