/// ドメイン層のエラー定義
///
/// 時刻範囲の制約違反と、エクスポート待機の終端状態を表現する。
/// 待機・ダウンロード中のゲートウェイ障害は `Api` として原因を保持する。
use crate::api::error::ApiError;
use crate::error_severity::ErrorSeverity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// 時刻文字列が解釈できない
    #[error("invalid timestamp '{input}' (expected YYYY-MM-DD HH:MM:SS)")]
    InvalidTimestamp { input: String },

    /// 開始が終了より後
    #[error("start {start} is after stop {stop}")]
    InvalidTimeRange { start: String, stop: String },

    /// 1回の録画検索が日付をまたいでいる
    #[error("range {start} .. {end} crosses midnight")]
    CrossesMidnight { start: String, end: String },

    /// ゲートウェイがエクスポート失敗（未知の結果コード）を返した
    #[error("export task failed with result code {result}")]
    ExportFailed { result: u32 },

    /// 最大試行回数までに完了しなかった
    #[error("export task not ready after {attempts} status checks")]
    ExportTimeout { attempts: u32 },

    /// 完了と報告されたがファイル情報がない
    #[error("export task reported ready without a file")]
    MissingExportFile,

    /// キャンセルされた
    #[error("operation cancelled")]
    Cancelled,

    /// ゲートウェイとの通信エラー
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl DomainError {
    /// 時刻パースエラーを生成
    pub fn invalid_timestamp(input: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            input: input.into(),
        }
    }

    /// エラーの深刻度を返す
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidTimestamp { .. }
            | Self::InvalidTimeRange { .. }
            | Self::CrossesMidnight { .. } => ErrorSeverity::UserError,
            Self::ExportFailed { .. } | Self::ExportTimeout { .. } | Self::MissingExportFile => {
                ErrorSeverity::SystemError
            }
            Self::Cancelled => ErrorSeverity::Cancelled,
            Self::Api(e) => e.severity(),
        }
    }

    /// ユーザー向けのヒントメッセージを返す
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidTimestamp { .. } => Some("Use the form '2024-03-01 10:00:00'."),
            Self::InvalidTimeRange { .. } => Some("The start time must not be after the stop time."),
            Self::CrossesMidnight { .. } => {
                Some("The gateway searches one calendar day at a time. Split the range at midnight.")
            }
            Self::ExportFailed { .. } => Some(
                "Set export.unknown_status = \"retry\" in config.toml to keep waiting on unknown codes.",
            ),
            Self::ExportTimeout { .. } => {
                Some("Increase export.max_poll_attempts or remove it to wait indefinitely.")
            }
            Self::Api(e) => e.hint(),
            _ => None,
        }
    }
}
