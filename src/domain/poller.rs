/// ドメインサービス: エクスポート完了待ち
///
/// ゲートウェイ側のエクスポートは非同期に進むため、状態を繰り返し問い合わせる。
/// 状態確認の前に待機し、未完了のたびに待機時間を倍にする（D, 2D, 4D, ...）。
///
/// 終端状態:
/// - 完了（結果コード 11）: ファイル情報を返す
/// - 失敗（未知の結果コード、`UnknownStatusPolicy::Fail` の場合）
/// - 試行回数超過（`max_attempts` 指定時）
/// - キャンセル（待機中も含めて監視する）
use crate::api::error::ApiError;
use crate::api::types::{DownloadTaskResponse, ExportStatus, ExportedFile};
use crate::config::APP_CONFIG;
use crate::domain::error::DomainError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 未知の結果コードの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatusPolicy {
    /// 失敗として待機を終了する
    #[default]
    Fail,
    /// 処理中とみなして待機を続ける
    Retry,
}

/// 待機ポリシー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// 最初の状態確認までの待機
    pub initial_delay: Duration,
    /// 待機の上限（None なら倍々に増え続ける）
    pub max_delay: Option<Duration>,
    /// 状態確認の最大回数（None なら無制限）
    pub max_attempts: Option<u32>,
    pub unknown_status: UnknownStatusPolicy,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(APP_CONFIG.export.initial_poll_delay_seconds),
            max_delay: None,
            max_attempts: None,
            unknown_status: UnknownStatusPolicy::default(),
        }
    }
}

impl PollPolicy {
    /// `attempt` 回目（1始まり）の状態確認の前に待つ時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = 2u32
            .checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(max) => doubled.min(max),
            None => doubled,
        }
    }
}

/// エクスポート状態の問い合わせ先
#[async_trait]
pub trait ExportStatusSource: Send + Sync {
    async fn export_status(&self, task_url: &str) -> Result<DownloadTaskResponse, ApiError>;
}

/// 状態確認1回の結果に対する次の動作
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollStep {
    Ready(ExportedFile),
    Wait,
}

fn next_step(response: DownloadTaskResponse, policy: &PollPolicy) -> Result<PollStep, DomainError> {
    match response.status() {
        ExportStatus::Ready => response
            .old_task_all
            .filter(|file| !file.dph.is_empty())
            .map(PollStep::Ready)
            .ok_or(DomainError::MissingExportFile),
        ExportStatus::Processing => Ok(PollStep::Wait),
        ExportStatus::Unknown(code) => match policy.unknown_status {
            UnknownStatusPolicy::Retry => {
                warn!(result = code, "Unknown export status, treating as not ready");
                Ok(PollStep::Wait)
            }
            UnknownStatusPolicy::Fail => Err(DomainError::ExportFailed { result: code }),
        },
    }
}

/// エクスポートが完了するまで待つ
///
/// # Errors
/// - `Cancelled`: 状態確認の前、または待機中にキャンセルされた
/// - `ExportFailed` / `ExportTimeout` / `MissingExportFile`
/// - `Api`: 問い合わせ自体の失敗（リトライしない）
pub async fn wait_until_ready<S>(
    source: &S,
    task_url: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<ExportedFile, DomainError>
where
    S: ExportStatusSource + ?Sized,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }
        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                return Err(DomainError::ExportTimeout { attempts: attempt });
            }
        }

        attempt += 1;
        let delay = policy.delay_for(attempt);
        debug!(attempt, delay_secs = delay.as_secs(), "Waiting for export task");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DomainError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        let response = source.export_status(task_url).await?;
        if let PollStep::Ready(file) = next_step(response, policy)? {
            info!(attempt, path = %file.dph, bytes = file.len, "Export task ready");
            return Ok(file);
        }
    }
}
