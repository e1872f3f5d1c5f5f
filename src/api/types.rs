/// API通信用の型定義
///
/// CMSゲートウェイのレスポンスをデシリアライズするための構造体を定義します。
/// フィールド名はゲートウェイ側で固定されているため、serde の rename で合わせます。
use serde::{Deserialize, Deserializer, Serialize};

/// エクスポート処理中を表す結果コード
pub const EXPORT_STATUS_PROCESSING: u32 = 0;

/// エクスポート完了を表す結果コード
pub const EXPORT_STATUS_READY: u32 = 11;

/// ログインレスポンス
///
/// `StandardApiAction_login.action` のレスポンス型
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub result: u32,

    #[serde(default)]
    pub jsession: String,
}

/// 録画ファイル情報レスポンス
///
/// `StandardApiAction_getVideoFileInfc.action` のレスポンス型
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoFileInfoResponse {
    #[serde(default)]
    pub result: u32,

    /// 該当ファイルがない場合、ゲートウェイは null を返すことがある
    #[serde(rename = "Files", default)]
    pub files: Option<Vec<VideoFile>>,
}

impl VideoFileInfoResponse {
    /// エクスポートタスク一覧（null は空として扱う）
    pub fn files(&self) -> &[VideoFile] {
        self.files.as_deref().unwrap_or_default()
    }
}

/// エクスポートタスク記述子
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoFile {
    /// エクスポートの起動・状態確認に使う不透明なURL
    #[serde(rename = "DownTaskUrl")]
    pub down_task_url: String,
}

/// エクスポート状態レスポンス
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadTaskResponse {
    pub result: u32,

    #[serde(rename = "oldTaskAll", default)]
    pub old_task_all: Option<ExportedFile>,
}

/// 完了したエクスポートの格納先
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExportedFile {
    /// ゲートウェイ側のファイルパス
    #[serde(default)]
    pub dph: String,

    /// ファイル長（バイト）
    #[serde(default)]
    pub len: u64,
}

/// エクスポートタスクの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Processing,
    Ready,
    Unknown(u32),
}

impl From<u32> for ExportStatus {
    fn from(result: u32) -> Self {
        match result {
            EXPORT_STATUS_PROCESSING => Self::Processing,
            EXPORT_STATUS_READY => Self::Ready,
            other => Self::Unknown(other),
        }
    }
}

impl DownloadTaskResponse {
    pub fn status(&self) -> ExportStatus {
        ExportStatus::from(self.result)
    }
}

/// 軌跡詳細レスポンス
///
/// `StandardApiAction_queryTrackDetail.action` のレスポンス型
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackDetailResponse {
    #[serde(default)]
    pub result: u32,

    #[serde(default)]
    pub pagination: Pagination,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub tracks: Vec<TrackRecord>,
}

/// ページング情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub page_records: u32,
}

/// GPS サンプル1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// 経度（ゲートウェイのスケール済み整数）
    pub lng: i64,

    /// 緯度（ゲートウェイのスケール済み整数）
    pub lat: i64,

    /// 速度
    #[serde(rename = "sp", default)]
    pub speed: u32,

    /// ステータスビットマスク
    #[serde(rename = "s1", default)]
    pub status_register: u32,

    /// GPS時刻（"YYYY-MM-DD HH:MM:SS"）
    #[serde(rename = "gt", default)]
    pub time: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
