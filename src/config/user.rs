/// ユーザー設定モジュール
///
/// 実行時にユーザーディレクトリ（または --config で指定したパス）から
/// 読み込まれる動的設定を管理します。
/// Windows: C:\Users\<User>\AppData\Roaming\cmsv6\config.toml
/// macOS:   /Users/<User>/Library/Application Support/cmsv6/config.toml
/// Linux:   /home/<user>/.config/cmsv6/config.toml
///
/// 初回起動時にテンプレートから自動的に config.toml を作成します。
use crate::config::app::APP_CONFIG;
use crate::config::error::ConfigError;
use crate::config::permissions;
use crate::domain::poller::{PollPolicy, UnknownStatusPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ゲートウェイ接続設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// ゲートウェイのホスト名またはIPアドレス
    #[serde(default)]
    pub host: String,

    /// API ポート
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// ダウンロードポート
    #[serde(default = "default_download_port")]
    pub download_port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_port: default_api_port(),
            download_port: default_download_port(),
        }
    }
}

impl GatewayConfig {
    /// API のベースURL
    pub fn api_base(&self) -> String {
        format!("http://{}:{}", self.host, self.api_port)
    }

    /// ダウンロードのベースURL
    pub fn download_base(&self) -> String {
        format!("http://{}:{}", self.host, self.download_port)
    }
}

/// CMS ログイン資格情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub account: String,
    pub password: String,
}

/// エクスポート設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// ダウンロードしたファイルの保存先
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// トランスコーダの実行ファイル
    #[serde(default = "default_transcoder")]
    pub transcoder: String,

    /// 最初の状態確認までの待機(秒)。以後、未完了のたびに倍になる
    #[serde(default = "default_initial_poll_delay")]
    pub initial_poll_delay_seconds: u64,

    /// 待機の上限(秒)。未指定なら上限なし
    #[serde(default)]
    pub max_poll_delay_seconds: Option<u64>,

    /// 状態確認の最大回数。未指定なら無制限
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,

    /// 未知の結果コードの扱い
    #[serde(default)]
    pub unknown_status: UnknownStatusPolicy,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            transcoder: default_transcoder(),
            initial_poll_delay_seconds: default_initial_poll_delay(),
            max_poll_delay_seconds: None,
            max_poll_attempts: None,
            unknown_status: UnknownStatusPolicy::default(),
        }
    }
}

impl ExportSettings {
    /// 待機ポリシーに変換
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_secs(self.initial_poll_delay_seconds),
            max_delay: self.max_poll_delay_seconds.map(Duration::from_secs),
            max_attempts: self.max_poll_attempts,
            unknown_status: self.unknown_status,
        }
    }
}

/// ユーザー設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// CMS 認証情報
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub export: ExportSettings,
}

// プライベート関数（serde用）
fn default_api_port() -> u16 {
    APP_CONFIG.api.default_api_port
}

fn default_download_port() -> u16 {
    APP_CONFIG.api.default_download_port
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_transcoder() -> String {
    APP_CONFIG.export.default_transcoder.to_string()
}

fn default_initial_poll_delay() -> u64 {
    APP_CONFIG.export.initial_poll_delay_seconds
}

impl UserConfig {
    /// 既定の設定ファイルパスを取得
    ///
    /// # Errors
    /// 設定ディレクトリが取得できない場合に ConfigError::DirectoryNotFound を返します。
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .ok_or_else(|| ConfigError::directory_not_found("Failed to get user config directory"))
            .map(|config_dir| config_dir.join("cmsv6").join("config.toml"))
    }

    /// --config 指定があればそれを、なければ既定のパスを返す
    pub fn resolve_path(override_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        match override_path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::config_path(),
        }
    }

    /// ユーザー設定を読み込む
    ///
    /// 設定ファイルが存在しない場合は、テンプレートから自動的に作成します。
    /// 読み込み後、自動的に検証を実行します（Fail Fast）。
    pub fn load(override_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = Self::resolve_path(override_path)?;
        Self::load_from(&config_path)
    }

    /// 指定パスからユーザー設定を読み込む
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
        }

        let content = fs::read_to_string(config_path).map_err(|e| {
            ConfigError::file_system(
                format!("Failed to read config file: {}", config_path.display()),
                e,
            )
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ConfigError::parse_error(
                format!("Failed to parse config file ({})", config_path.display()),
                e,
            )
        })?;

        config.validate()?;

        Ok(config)
    }

    /// デフォルト設定ファイルを作成
    fn create_default_config(config_path: &Path) -> Result<(), ConfigError> {
        Self::ensure_parent_dir(config_path)?;

        fs::write(config_path, Self::default_toml_content()).map_err(|e| {
            ConfigError::file_system(
                format!("Failed to create default config file: {}", config_path.display()),
                e,
            )
        })?;

        Ok(())
    }

    fn ensure_parent_dir(config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::file_system(
                    format!("Failed to create config directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// テンプレートTOMLを生成
    ///
    /// 値は Default 実装と同じ定数から埋め込む。
    fn default_toml_content() -> String {
        format!(
            r#"# cmsv6 - User Configuration
# Credentials are set with 'cmsv6 login'

[gateway]
# Host name or IP address of the CMS gateway
host = ""
api_port = {}
download_port = {}

[export]
download_dir = "."
transcoder = "{}"
# First status check happens after this many seconds; the wait doubles while not ready
initial_poll_delay_seconds = {}
# max_poll_delay_seconds = 1800
# max_poll_attempts = 12
# "fail" stops on unknown export result codes, "retry" keeps waiting
unknown_status = "fail"
"#,
            APP_CONFIG.api.default_api_port,
            APP_CONFIG.api.default_download_port,
            APP_CONFIG.export.default_transcoder,
            APP_CONFIG.export.initial_poll_delay_seconds,
        )
    }

    /// ユーザー設定を保存する
    ///
    /// パスワードを含むため、保存後にパーミッションを所有者のみに制限します。
    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        Self::ensure_parent_dir(config_path)?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::serialize_error("Failed to serialize config", e))?;

        fs::write(config_path, content).map_err(|e| {
            ConfigError::file_system(
                format!("Failed to write config file: {}", config_path.display()),
                e,
            )
        })?;

        permissions::restrict_to_owner(config_path)
    }

    /// ユーザー設定を検証
    ///
    /// Fail Fast: 設定に問題がある場合は即座にエラーを返します。
    ///
    /// # 検証内容
    /// - auth.account / auth.password: 空文字列でないこと
    /// - ポート: 0 でないこと
    /// - 待機時間・最大回数: 0 でないこと、上限が初期値以上であること
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(auth) = &self.auth {
            Self::validate_auth_field(&auth.account, "account")?;
            Self::validate_auth_field(&auth.password, "password")?;
        }

        if self.gateway.api_port == 0 || self.gateway.download_port == 0 {
            return Err(ConfigError::validation_error(
                "gateway.api_port and gateway.download_port must be non-zero",
            ));
        }

        let export = &self.export;
        if export.initial_poll_delay_seconds == 0 {
            return Err(ConfigError::validation_error(
                "export.initial_poll_delay_seconds must be at least 1",
            ));
        }
        if let Some(max) = export.max_poll_delay_seconds {
            if max < export.initial_poll_delay_seconds {
                return Err(ConfigError::validation_error(format!(
                    "export.max_poll_delay_seconds ({}) is smaller than initial_poll_delay_seconds ({})",
                    max, export.initial_poll_delay_seconds
                )));
            }
        }
        if export.max_poll_attempts == Some(0) {
            return Err(ConfigError::validation_error(
                "export.max_poll_attempts must be at least 1",
            ));
        }
        if export.transcoder.trim().is_empty() {
            return Err(ConfigError::validation_error("export.transcoder cannot be empty"));
        }

        Ok(())
    }

    fn validate_auth_field(value: &str, field_name: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::validation_error(format!(
                "auth.{} cannot be empty. Please run 'cmsv6 login' again.",
                field_name
            )));
        }
        Ok(())
    }

    /// 認証情報を設定
    pub fn set_auth(&mut self, account: String, password: String) {
        self.auth = Some(AuthConfig { account, password });
    }

    /// 認証情報を取得
    ///
    /// # Errors
    /// 認証情報が設定されていない場合に ConfigError::CredentialsNotFound を返します。
    pub fn get_auth(&self) -> Result<&AuthConfig, ConfigError> {
        self.auth.as_ref().ok_or_else(|| {
            ConfigError::credentials_not_found("No CMS account saved. Please run 'cmsv6 login' first.")
        })
    }

    /// 認証情報が存在するかチェック
    pub fn has_auth(&self) -> bool {
        self.auth.is_some()
    }

    /// ゲートウェイ設定を取得（ホスト未設定ならエラー）
    pub fn require_gateway(&self) -> Result<&GatewayConfig, ConfigError> {
        if self.gateway.host.trim().is_empty() {
            return Err(ConfigError::GatewayNotConfigured);
        }
        Ok(&self.gateway)
    }
}
