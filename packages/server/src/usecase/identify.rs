//! UseCase: 接続の識別処理
//!
//! doorclient は共有シークレット、webclient は時間スライス付き HMAC トークンで
//! 認証する。失敗した場合、接続は未識別のまま残り、以降の特権メッセージは無視される。

use std::sync::Arc;

use doorbridge_shared::{time::Clock, token::verify_token, wire::ClientRole};
use subtle::ConstantTimeEq;

use crate::domain::{ConnectionRole, CredentialStore, UserName};

use super::error::IdentifyError;

/// 識別フレームの内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyRequest {
    pub role: ClientRole,
    pub secret: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
}

/// 接続識別のユースケース
pub struct IdentifyConnectionUseCase {
    /// 認証情報ストア
    credentials: Arc<dyn CredentialStore>,
    /// doorclient と共有するシークレット（トークンの HMAC 鍵も兼ねる）
    secret: String,
    /// トークンの有効期間（秒）
    token_valid_secs: u64,
    clock: Arc<dyn Clock>,
}

impl IdentifyConnectionUseCase {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        secret: String,
        token_valid_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            secret,
            token_valid_secs,
            clock,
        }
    }

    /// 識別を実行
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectionRole)` - 新しい役割
    /// * `Err(IdentifyError)` - 識別失敗（役割は変わらない）
    pub fn execute(
        &self,
        current: &ConnectionRole,
        request: IdentifyRequest,
    ) -> Result<ConnectionRole, IdentifyError> {
        // 役割は接続ごとに一度だけ決まる
        if *current != ConnectionRole::Unidentified {
            return Err(IdentifyError::AlreadyIdentified(current.label()));
        }

        match request.role {
            ClientRole::Doorclient => {
                let secret = request.secret.ok_or(IdentifyError::MissingField("secret"))?;
                if bool::from(secret.as_bytes().ct_eq(self.secret.as_bytes())) {
                    Ok(ConnectionRole::Doorclient)
                } else {
                    Err(IdentifyError::BadSecret)
                }
            }
            ClientRole::Webclient => {
                let user = request.user.ok_or(IdentifyError::MissingField("user"))?;
                let token = request.token.ok_or(IdentifyError::MissingField("token"))?;
                let name = UserName::new(user.clone())
                    .map_err(|_| IdentifyError::MissingField("user"))?;
                let record = self
                    .credentials
                    .lookup(name.as_str())
                    .ok_or_else(|| IdentifyError::UnknownUser(user.clone()))?;

                let now_secs = u64::try_from(self.clock.now_millis() / 1000).unwrap_or(0);
                let valid = verify_token(
                    &self.secret,
                    &record.password_hash,
                    &token,
                    now_secs,
                    self.token_valid_secs,
                )?;
                if valid {
                    Ok(ConnectionRole::Webclient(name))
                } else {
                    Err(IdentifyError::BadToken(user))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use doorbridge_shared::{time::FixedClock, token::make_token};

    use super::*;
    use crate::domain::{MockCredentialStore, UserRecord};

    const SECRET: &str = "sekrit";
    const NOW_MILLIS: i64 = 1_700_000_030_000;

    fn usecase(store: MockCredentialStore) -> IdentifyConnectionUseCase {
        IdentifyConnectionUseCase::new(
            Arc::new(store),
            SECRET.to_string(),
            60,
            Arc::new(FixedClock::new(NOW_MILLIS)),
        )
    }

    fn store_with_alice() -> MockCredentialStore {
        let mut store = MockCredentialStore::new();
        store.expect_lookup().returning(|user| {
            (user == "alice").then(|| UserRecord {
                password_hash: "hash".to_string(),
                doors: BTreeSet::from([0]),
            })
        });
        store
    }

    fn webclient(user: &str, token: &str) -> IdentifyRequest {
        IdentifyRequest {
            role: ClientRole::Webclient,
            secret: None,
            user: Some(user.to_string()),
            token: Some(token.to_string()),
        }
    }

    #[test]
    fn test_doorclient_with_matching_secret() {
        // テスト項目: 正しいシークレットで doorclient として識別される
        // given (前提条件):
        let usecase = usecase(MockCredentialStore::new());
        let request = IdentifyRequest {
            role: ClientRole::Doorclient,
            secret: Some(SECRET.to_string()),
            user: None,
            token: None,
        };

        // when (操作):
        let result = usecase.execute(&ConnectionRole::Unidentified, request);

        // then (期待する結果):
        assert_eq!(result, Ok(ConnectionRole::Doorclient));
    }

    #[test]
    fn test_doorclient_with_wrong_or_missing_secret() {
        // テスト項目: シークレットが違う、または欠けている場合は識別されない
        // given (前提条件):
        let usecase = usecase(MockCredentialStore::new());
        let wrong = IdentifyRequest {
            role: ClientRole::Doorclient,
            secret: Some("guess".to_string()),
            user: None,
            token: None,
        };
        let missing = IdentifyRequest {
            secret: None,
            ..wrong.clone()
        };

        // when (操作):
        let wrong = usecase.execute(&ConnectionRole::Unidentified, wrong);
        let missing = usecase.execute(&ConnectionRole::Unidentified, missing);

        // then (期待する結果):
        assert_eq!(wrong, Err(IdentifyError::BadSecret));
        assert_eq!(missing, Err(IdentifyError::MissingField("secret")));
    }

    #[test]
    fn test_webclient_with_current_token() {
        // テスト項目: 現在のスライスのトークンで webclient として識別される
        // given (前提条件):
        let usecase = usecase(store_with_alice());
        let token = make_token(SECRET, "hash", (NOW_MILLIS / 1000) as u64, 60).unwrap();

        // when (操作):
        let result = usecase.execute(&ConnectionRole::Unidentified, webclient("alice", &token));

        // then (期待する結果):
        assert_eq!(
            result,
            Ok(ConnectionRole::Webclient(
                UserName::new("alice".to_string()).unwrap()
            ))
        );
    }

    #[test]
    fn test_webclient_with_bad_token_or_unknown_user() {
        // テスト項目: トークン不一致や未登録ユーザーは識別されない
        // given (前提条件):
        let usecase = usecase(store_with_alice());
        let token = make_token(SECRET, "hash", (NOW_MILLIS / 1000) as u64, 60).unwrap();
        let stale = make_token(SECRET, "hash", (NOW_MILLIS / 1000) as u64 - 600, 60).unwrap();

        // when (操作):
        let unknown = usecase.execute(&ConnectionRole::Unidentified, webclient("mallory", &token));
        let stale = usecase.execute(&ConnectionRole::Unidentified, webclient("alice", &stale));

        // then (期待する結果):
        assert_eq!(unknown, Err(IdentifyError::UnknownUser("mallory".to_string())));
        assert_eq!(stale, Err(IdentifyError::BadToken("alice".to_string())));
    }

    #[test]
    fn test_role_cannot_change_once_identified() {
        // テスト項目: 識別済みの接続は再識別できない
        // given (前提条件):
        let usecase = usecase(MockCredentialStore::new());
        let request = IdentifyRequest {
            role: ClientRole::Doorclient,
            secret: Some(SECRET.to_string()),
            user: None,
            token: None,
        };
        let current = ConnectionRole::Webclient(UserName::new("alice".to_string()).unwrap());

        // when (操作):
        let result = usecase.execute(&current, request);

        // then (期待する結果):
        assert_eq!(result, Err(IdentifyError::AlreadyIdentified("webclient")));
    }
}
