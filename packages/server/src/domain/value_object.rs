//! Value Object 定義
//!
//! ハブのドメインで使う不変の値を定義します。

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::ValueObjectError;

/// WebSocket 接続ごとに割り当てられる ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// アンロック指示と ack を対応付ける相関 ID
///
/// ハブがリクエストごとに生成する。外部からは不透明な文字列として扱う。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// 新しい MessageId を生成（UUID v4 の hex 表記）
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// doorclient から受け取った ID を復元する
    pub fn from_wire(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ログインユーザー名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserName(String);

impl UserName {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::EmptyUserName);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ドア番号（0 始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DoorIndex(usize);

impl DoorIndex {
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    pub fn value(&self) -> usize {
        self.0
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `earlier` からの経過ミリ秒
    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_name_rejects_blank() {
        // テスト項目: 空白のみのユーザー名は作成できない
        // given (前提条件):
        let blank = "   ".to_string();

        // when (操作):
        let result = UserName::new(blank);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::EmptyUserName));
    }

    #[test]
    fn test_message_id_is_unique_hex() {
        // テスト項目: MessageId は毎回異なる 32 桁の hex 文字列になる
        // given (前提条件):
        // when (操作):
        let first = MessageId::generate();
        let second = MessageId::generate();

        // then (期待する結果):
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 32);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timestamp_millis_since() {
        // テスト項目: 2 つのタイムスタンプの差がミリ秒で得られる
        // given (前提条件):
        let earlier = Timestamp::new(1_000);
        let later = Timestamp::new(31_000);

        // when (操作):
        let elapsed = later.millis_since(earlier);

        // then (期待する結果):
        assert_eq!(elapsed, 30_000);
    }
}
