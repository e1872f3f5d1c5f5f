/// ログインコマンド
///
/// CMS アカウントとパスワードでゲートウェイに実際にログインして検証し、
/// 資格情報を config.toml に保存します。
use crate::api::client::CmsClient;
use crate::api::session::{Credentials, mask};
use crate::commands::result::{CommandResult, LoginResult};
use crate::config::UserConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// ログイン資格情報（プレゼンテーション層から受け取る）
pub struct LoginCredentials {
    pub account: String,
    pub password: String,
}

/// ログインコマンドを実行
///
/// # Arguments
/// * `credentials` - 入力された資格情報
/// * `config_path` - --config で指定された設定ファイル
///
/// # Returns
/// 成功時はCommandResult::Login、失敗時はエラー
pub async fn execute(
    credentials: LoginCredentials,
    config_path: Option<&Path>,
) -> Result<CommandResult> {
    let path = UserConfig::resolve_path(config_path)?;
    let mut config = UserConfig::load_from(&path).context("Failed to load configuration file")?;
    let gateway = config.require_gateway()?;

    let client = CmsClient::new(
        &gateway.api_base(),
        &gateway.download_base(),
        Credentials::new(credentials.account.clone(), credentials.password.clone()),
        config.export.download_dir.clone(),
    )
    .context("Failed to create gateway client")?;

    client
        .reauthenticate()
        .await
        .context("Authentication failed. Please verify your account and password are correct.")?;

    let was_logged_in = config.has_auth();
    let account = mask(&credentials.account);
    config.set_auth(credentials.account, credentials.password);
    config
        .save_to(&path)
        .context("Failed to save configuration file")?;

    info!(config = %path.display(), "Saved CMS credentials");

    Ok(CommandResult::Login(LoginResult {
        was_logged_in,
        account,
    }))
}
