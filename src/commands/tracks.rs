/// 軌跡コマンド
///
/// 端末の GPS 軌跡を1ページ、または全ページ取得する。
use crate::commands::build_client;
use crate::commands::result::{CommandResult, TracksResult};
use crate::config::UserConfig;
use crate::domain::window::{TimeRange, parse_timestamp};
use anyhow::{Context, Result};
use std::path::Path;

/// 軌跡の取得条件
pub struct TracksRequest {
    pub device_id: String,
    pub start: String,
    pub stop: String,
    pub page: u32,
    pub page_size: u32,
    /// 全ページを連結して取得する
    pub all: bool,
}

pub async fn execute(request: TracksRequest, config_path: Option<&Path>) -> Result<CommandResult> {
    let range = TimeRange::new(
        parse_timestamp(&request.start)?,
        parse_timestamp(&request.stop)?,
    )?;

    let config = UserConfig::load(config_path).context("Failed to load configuration file")?;
    let client = build_client(&config)?;

    let fetched = if request.all {
        client
            .fetch_all_tracks(&request.device_id, request.page_size, &range.start(), &range.stop())
            .await
    } else {
        client
            .get_track_detail(
                &request.device_id,
                request.page,
                request.page_size,
                &range.start(),
                &range.stop(),
            )
            .await
    };
    let detail = fetched.context("Failed to fetch track detail")?;

    Ok(CommandResult::Tracks(TracksResult {
        device_id: request.device_id,
        pagination: detail.pagination,
        tracks: detail.tracks,
    }))
}
