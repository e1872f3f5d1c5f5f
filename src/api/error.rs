/// インフラ層のエラー定義
///
/// CMSゲートウェイ（HTTP API）およびローカルファイルシステムとの
/// やり取りで発生するエラーを構造化して定義。
use crate::error_severity::ErrorSeverity;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 接続失敗などのネットワークエラー
    #[error("transport error: {message}")]
    Transport { message: String },

    /// タイムアウト
    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    /// HTTPステータスが200以外
    #[error("gateway returned HTTP {status} for {endpoint}: {body}")]
    Protocol {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// レスポンスボディがJSONとして解釈できない
    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// ログイン結果コードが0以外
    #[error("authentication failed (result code {result})")]
    Authentication { result: u32 },

    /// ログイン以外のアクションの結果コードが0以外
    #[error("gateway rejected {endpoint} (result code {result})")]
    Vendor { endpoint: String, result: u32 },

    /// DownTaskUrl がエクスポート状態の問い合わせに使えない
    #[error("invalid export task url: {message}")]
    InvalidTaskUrl { message: String },

    /// サーバー側ファイルパスから安全なローカルファイル名を得られない
    #[error("refusing to save server path '{path}'")]
    InvalidFilePath { path: String },

    /// ローカルファイルの作成・書き込みエラー
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ApiError {
    /// ネットワークエラーを作成
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// タイムアウトエラーを作成
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// プロトコルエラーを作成
    pub fn protocol(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// デコードエラーを作成
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// I/Oエラーを作成
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// エラーの深刻度を返す
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Authentication { .. } => ErrorSeverity::ConfigError,
            _ => ErrorSeverity::SystemError,
        }
    }

    /// ユーザー向けのヒントメッセージを返す
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => {
                Some("Check that the gateway host and ports in config.toml are reachable.")
            }
            Self::Authentication { .. } => {
                Some("The gateway rejected the account. Run 'cmsv6 login' to update credentials.")
            }
            Self::Io { .. } => Some("Check that the download directory exists and is writable."),
            _ => None,
        }
    }
}
