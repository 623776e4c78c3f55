//! 認証情報ストアの trait 定義
//!
//! ユーザーごとのパスワードハッシュと許可ドアの一覧を引きます。
//! 具体的な実装（パスワードファイル）は Infrastructure 層が提供します。

use super::UserRecord;

/// ユーザー情報の参照口
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// ユーザーが存在しなければ `None`
    fn lookup(&self, user: &str) -> Option<UserRecord>;
}
