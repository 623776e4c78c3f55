//! UseCase 層のエラー定義

use doorbridge_shared::token::TokenError;
use thiserror::Error;

use crate::domain::RepositoryError;

/// 識別処理のエラー
///
/// どの検証で失敗したかは呼び出し元にだけ伝え、接続相手には返さない。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifyError {
    #[error("connection is already identified as {0}")]
    AlreadyIdentified(&'static str),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("doorclient secret mismatch")]
    BadSecret,
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("token mismatch for user '{0}'")]
    BadToken(String),
    #[error("token computation failed: {0}")]
    Token(#[from] TokenError),
}

/// アンロック要求のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestUnlockError {
    #[error("unlock requests are accepted from webclients only")]
    NotWebclient,
    #[error("frame names user '{claimed}' but connection belongs to '{identified}'")]
    RequesterMismatch { claimed: String, identified: String },
    #[error("user '{0}' is no longer known")]
    UnknownUser(String),
    #[error("user '{user}' is not authorized for door {door}")]
    Unauthorized { user: String, door: usize },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// doorclient 専用メッセージ（ack / broadcast）のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DoorclientMessageError {
    #[error("message accepted from doorclient only, got {0}")]
    NotDoorclient(&'static str),
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
