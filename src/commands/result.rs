/// コマンド実行結果を表す型
///
/// 各コマンドはこの型を返し、プレゼンテーション層で
/// 人間向けと機械向けの出力フォーマットを決定する。
use crate::api::types::{Pagination, TrackRecord};
use crate::domain::exporter::ExportSummary;
use serde::Serialize;

/// コマンド実行結果の統一型
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandResult {
    Login(LoginResult),
    Export(ExportResult),
    Tracks(TracksResult),
}

/// ログインコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    /// 既に資格情報が保存されていたか（上書き更新の場合true）
    pub was_logged_in: bool,
    /// マスキングしたアカウント名
    pub account: String,
}

/// エクスポートコマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub device_id: String,
    pub channel: u32,
    pub start: String,
    pub stop: String,
    pub summary: ExportSummary,
}

/// 軌跡コマンドの結果
#[derive(Debug, Clone, Serialize)]
pub struct TracksResult {
    pub device_id: String,
    /// 最後に取得したページの情報
    pub pagination: Pagination,
    pub tracks: Vec<TrackRecord>,
}

impl CommandResult {
    /// 成功メッセージを取得（人間向け出力用）
    pub fn success_message(&self) -> String {
        match self {
            CommandResult::Login(r) => {
                if r.was_logged_in {
                    "Login credentials updated!".to_string()
                } else {
                    "Login successful!".to_string()
                }
            }
            CommandResult::Export(r) => format!(
                "Export finished: {} file(s) downloaded, {} converted.",
                r.summary.downloaded.len(),
                r.summary.converted.len()
            ),
            CommandResult::Tracks(r) => format!("{} track point(s).", r.tracks.len()),
        }
    }
}
