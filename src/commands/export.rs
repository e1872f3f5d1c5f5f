/// エクスポートコマンド
///
/// 指定区間の録画をゲートウェイからエクスポートし、ダウンロードして変換する。
use crate::commands::build_client;
use crate::commands::result::{CommandResult, ExportResult};
use crate::config::UserConfig;
use crate::domain::exporter::SegmentExporter;
use crate::domain::transcoder::CommandTranscoder;
use crate::domain::window::{TimeRange, format_timestamp, parse_timestamp};
use anyhow::{Context, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// エクスポートの対象
pub struct ExportRequest {
    pub device_id: String,
    pub channel: u32,
    pub start: String,
    pub stop: String,
}

/// エクスポートコマンドを実行
///
/// `cancel` がキャンセルされると、次の状態確認を待たずに中断する。
pub async fn execute(
    request: ExportRequest,
    config_path: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<CommandResult> {
    let range = TimeRange::new(
        parse_timestamp(&request.start)?,
        parse_timestamp(&request.stop)?,
    )?;

    let config = UserConfig::load(config_path).context("Failed to load configuration file")?;
    let client = build_client(&config)?;

    tokio::fs::create_dir_all(client.download_dir())
        .await
        .with_context(|| {
            format!(
                "Failed to create download directory {}",
                client.download_dir().display()
            )
        })?;

    let transcoder = CommandTranscoder::new(config.export.transcoder.clone());
    let exporter = SegmentExporter::new(&client, &transcoder, config.export.poll_policy());

    let summary = exporter
        .run(&request.device_id, request.channel, &range, cancel)
        .await
        .context("Export failed")?;

    Ok(CommandResult::Export(ExportResult {
        device_id: request.device_id,
        channel: request.channel,
        start: format_timestamp(&range.start()),
        stop: format_timestamp(&range.stop()),
        summary,
    }))
}
