/// ドメインサービス: 区間エクスポート
///
/// 指定範囲を一定長の窓に区切り、窓ごとに以下を順に行う:
/// 1. 録画ファイル情報の検索（窓ごとに1回）
/// 2. 各エクスポートタスクの完了待ち
/// 3. ダウンロード
/// 4. トランスコード（失敗しても記録して続行）
///
/// トランスコード以外のエラーは処理全体を中断して呼び出し元に返す。
use crate::api::client::CmsClient;
use crate::api::error::ApiError;
use crate::api::types::{DownloadTaskResponse, VideoFile};
use crate::config::APP_CONFIG;
use crate::domain::error::DomainError;
use crate::domain::poller::{self, ExportStatusSource, PollPolicy};
use crate::domain::transcoder::Transcoder;
use crate::domain::window::{ExportWindow, TimeRange, format_timestamp};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// エクスポートに必要なゲートウェイ操作
#[async_trait]
pub trait ExportApi: ExportStatusSource {
    /// 窓に該当するエクスポートタスクを取得
    async fn video_files(
        &self,
        device_id: &str,
        channel: u32,
        window: &ExportWindow,
    ) -> Result<Vec<VideoFile>, ApiError>;

    /// 完了したエクスポートを保存し、ローカルパスを返す
    async fn download(
        &self,
        device_id: &str,
        length: u64,
        server_path: &str,
    ) -> Result<PathBuf, ApiError>;
}

#[async_trait]
impl ExportStatusSource for CmsClient {
    async fn export_status(&self, task_url: &str) -> Result<DownloadTaskResponse, ApiError> {
        self.download_task_status(task_url).await
    }
}

#[async_trait]
impl ExportApi for CmsClient {
    async fn video_files(
        &self,
        device_id: &str,
        channel: u32,
        window: &ExportWindow,
    ) -> Result<Vec<VideoFile>, ApiError> {
        let info = self.get_video_file_info(device_id, channel, window).await?;
        Ok(info.files().to_vec())
    }

    async fn download(
        &self,
        device_id: &str,
        length: u64,
        server_path: &str,
    ) -> Result<PathBuf, ApiError> {
        CmsClient::download(self, device_id, length, server_path).await
    }
}

/// 1回のエクスポート実行の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// 検索した窓の数
    pub windows: usize,
    /// 見つかったエクスポートタスクの数
    pub tasks: usize,
    /// ダウンロードしたファイル
    pub downloaded: Vec<PathBuf>,
    /// 変換後のファイル
    pub converted: Vec<PathBuf>,
    /// 変換に失敗した数
    pub transcode_failures: usize,
}

/// 区間エクスポートの実行者
pub struct SegmentExporter<'a, A: ExportApi + ?Sized> {
    api: &'a A,
    transcoder: &'a dyn Transcoder,
    policy: PollPolicy,
    window: chrono::Duration,
}

impl<'a, A: ExportApi + ?Sized> SegmentExporter<'a, A> {
    pub fn new(api: &'a A, transcoder: &'a dyn Transcoder, policy: PollPolicy) -> Self {
        Self {
            api,
            transcoder,
            policy,
            window: chrono::Duration::seconds(APP_CONFIG.export.window_seconds),
        }
    }

    /// `range` の録画を窓ごとにエクスポートする
    ///
    /// # Errors
    /// キャンセル、エクスポート失敗、通信エラーで中断する。
    /// 中断までに保存したファイルはそのまま残る。
    pub async fn run(
        &self,
        device_id: &str,
        channel: u32,
        range: &TimeRange,
        cancel: &CancellationToken,
    ) -> Result<ExportSummary, DomainError> {
        let mut summary = ExportSummary::default();

        for window in range.windows(self.window) {
            let window = window?;
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }

            let files = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                files = self.api.video_files(device_id, channel, &window) => files?,
            };
            summary.windows += 1;
            summary.tasks += files.len();

            info!(
                start = %format_timestamp(&window.start()),
                end = %format_timestamp(&window.end()),
                tasks = files.len(),
                "Export window"
            );

            for file in &files {
                self.export_one(device_id, file, cancel, &mut summary).await?;
            }
        }

        Ok(summary)
    }

    async fn export_one(
        &self,
        device_id: &str,
        file: &VideoFile,
        cancel: &CancellationToken,
        summary: &mut ExportSummary,
    ) -> Result<(), DomainError> {
        let exported =
            poller::wait_until_ready(self.api, &file.down_task_url, &self.policy, cancel).await?;

        let local = self.api.download(device_id, exported.len, &exported.dph).await?;
        summary.downloaded.push(local.clone());

        match self.transcoder.convert(&local).await {
            Ok(output) => {
                info!(file = %output.display(), "Transcoded");
                summary.converted.push(output);
            }
            Err(e) => {
                warn!(file = %local.display(), error = %e, "Transcode failed, keeping raw file");
                summary.transcode_failures += 1;
            }
        }

        Ok(())
    }
}
