/// セッション管理
///
/// CMSゲートウェイはアカウントとパスワードでログインし、
/// 以後のすべての呼び出しに `jsession` を付与する。
/// トークンはクライアントが所有し、初回利用時に1度だけ取得して使い回す。
/// 有効期限や自動更新はゲートウェイ側の仕様が不明なため扱わない。
use crate::api::error::ApiError;
use std::future::Future;
use tokio::sync::Mutex;

/// ログイン資格情報
#[derive(Clone)]
pub struct Credentials {
    account: String,
    password: String,
}

impl Credentials {
    /// 新しい資格情報を作成
    ///
    /// # Arguments
    /// * `account` - CMS アカウント名
    /// * `password` - CMS パスワード
    pub fn new(account: String, password: String) -> Self {
        Self { account, password }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// アカウント名をマスキングして表示
    pub fn masked_account(&self) -> String {
        mask(&self.account)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.masked_account())
            .field("password", &"***")
            .finish()
    }
}

/// ログや出力向けに先頭と末尾だけ残してマスキング
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

/// セッショントークンの保持者
///
/// 書き込みは Mutex で直列化されるため、同じクライアントを並行に使っても
/// ログインは1回しか行われない。
#[derive(Debug, Default)]
pub struct Session {
    token: Mutex<Option<String>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保持しているトークンを返す。なければ `login` を実行して保存する。
    ///
    /// `login` が失敗した場合は何も保存せずエラーを返す（自動リトライしない）。
    pub async fn get_or_login<F, Fut>(&self, login: F) -> Result<String, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        let mut token = self.token.lock().await;
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }

        let fresh = login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// トークンを破棄する（次の呼び出しで再ログインする）
    pub async fn invalidate(&self) {
        self.token.lock().await.take();
    }
}
