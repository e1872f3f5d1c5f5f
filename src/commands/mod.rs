// Command layer
//
// Each command loads the user config, builds the gateway client and returns a
// CommandResult for the presentation layer. Errors are aggregated with anyhow.

pub mod export;
pub mod login;
pub mod result;
pub mod tracks;

pub use result::CommandResult;

use crate::api::client::CmsClient;
use crate::api::session::Credentials;
use crate::config::UserConfig;
use anyhow::{Context, Result};

/// 保存済みの設定からクライアントを作成
fn build_client(config: &UserConfig) -> Result<CmsClient> {
    let gateway = config.require_gateway()?;
    let auth = config.get_auth()?;

    CmsClient::new(
        &gateway.api_base(),
        &gateway.download_base(),
        Credentials::new(auth.account.clone(), auth.password.clone()),
        config.export.download_dir.clone(),
    )
    .context("Failed to create gateway client")
}
