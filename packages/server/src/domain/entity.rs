//! Entity 定義
//!
//! 接続の役割、アンロック指示、ブロードキャスト、ユーザー情報を表します。

use std::collections::{BTreeSet, HashSet};

use doorbridge_shared::wire::WireMessage;

use super::{DoorIndex, MessageId, SessionId, Timestamp, UserName};

/// ブロードキャストの有効期間（ミリ秒）
pub const BROADCAST_TTL_MILLIS: i64 = 30_000;

/// 接続の役割
///
/// 識別前の接続は `Unidentified` で、特権メッセージはすべて無視される。
/// 一度識別された役割は接続が閉じるまで変わらない。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionRole {
    #[default]
    Unidentified,
    Doorclient,
    Webclient(UserName),
}

impl ConnectionRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unidentified => "unidentified",
            Self::Doorclient => "doorclient",
            Self::Webclient(_) => "webclient",
        }
    }
}

/// コントローラーへ送るアンロック指示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockInstruction {
    pub requester: UserName,
    pub door: DoorIndex,
    pub message_id: MessageId,
    pub issued_at: Timestamp,
}

impl UnlockInstruction {
    /// doorclient 宛てのフレームに変換（共有シークレットを付与する）
    pub fn to_wire(&self, secret: &str) -> WireMessage {
        WireMessage::Unlock {
            body: self.requester.as_str().to_string(),
            doornum: self.door.value(),
            msgid: Some(self.message_id.as_str().to_string()),
            secret: Some(secret.to_string()),
        }
    }
}

/// doorclient から受け取ったブロードキャスト
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// 配信する JSON フレーム
    pub payload: String,
    pub created_at: Timestamp,
    pub delivered_to: HashSet<SessionId>,
}

impl Broadcast {
    pub fn new(payload: String, created_at: Timestamp) -> Self {
        Self {
            payload,
            created_at,
            delivered_to: HashSet::new(),
        }
    }

    /// 作成から 30 秒以上経過したら期限切れ
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.millis_since(self.created_at) >= BROADCAST_TTL_MILLIS
    }
}

/// パスワードファイルから読み込んだユーザー情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// 保存されているパスワードハッシュ（トークン計算の入力）
    pub password_hash: String,
    /// アンロックを許可されたドア
    pub doors: BTreeSet<usize>,
}

impl UserRecord {
    pub fn may_unlock(&self, door: DoorIndex) -> bool {
        self.doors.contains(&door.value())
    }
}
