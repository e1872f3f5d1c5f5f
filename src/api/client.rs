/// CMSゲートウェイ HTTPクライアント
///
/// ゲートウェイとの通信を担当するHTTPクライアント。
/// セッション管理、タイムアウト、エラーハンドリングを含みます。
/// エンドポイント名・パラメータ名はゲートウェイ側で固定されているため、
/// 変更してはいけません。
use crate::api::error::ApiError;
use crate::api::session::{Credentials, Session};
use crate::api::task_url;
use crate::api::types::{
    DownloadTaskResponse, LoginResponse, TrackDetailResponse, VideoFileInfoResponse,
};
use crate::config::APP_CONFIG;
use crate::domain::window::{ExportWindow, format_timestamp};
use chrono::{Datelike, NaiveDateTime};
use reqwest::{Client, RequestBuilder, Response, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// APIクライアントの結果型
type ApiResult<T> = Result<T, ApiError>;

const LOGIN_ACTION: &str = "StandardApiAction_login.action";
const VIDEO_FILE_INFO_ACTION: &str = "StandardApiAction_getVideoFileInfc.action";
const TRACK_DETAIL_ACTION: &str = "StandardApiAction_queryTrackDetail.action";
const EXPORT_STATUS_ENDPOINT: &str = "export task status";
const DOWNLOAD_PATH: &str = "3/5";

/// CMS APIクライアント
pub struct CmsClient {
    http: Client,
    api_base: Url,
    download_base: Url,
    credentials: Credentials,
    session: Session,
    download_dir: PathBuf,
}

impl CmsClient {
    /// 新しいAPIクライアントを作成
    ///
    /// # Arguments
    /// * `api_base` - APIポートのベースURL（例: "http://10.0.0.5:8080"）
    /// * `download_base` - ダウンロードポートのベースURL
    /// * `credentials` - ログイン資格情報
    /// * `download_dir` - ダウンロードしたファイルの保存先
    pub fn new(
        api_base: &str,
        download_base: &str,
        credentials: Credentials,
        download_dir: impl Into<PathBuf>,
    ) -> ApiResult<Self> {
        let timeout = Duration::from_secs(APP_CONFIG.api.timeout_seconds);

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: parse_base(api_base)?,
            download_base: parse_base(download_base)?,
            credentials,
            session: Session::new(),
            download_dir: download_dir.into(),
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// セッショントークンを取得（未取得ならログインする）
    pub async fn session(&self) -> ApiResult<String> {
        self.session.get_or_login(|| self.login()).await
    }

    /// 保持しているトークンを捨てて再ログインする
    pub async fn reauthenticate(&self) -> ApiResult<String> {
        self.session.invalidate().await;
        self.session().await
    }

    async fn login(&self) -> ApiResult<String> {
        let url = self.action_url(LOGIN_ACTION)?;
        let request = self.http.post(url).query(&[
            ("account", self.credentials.account()),
            ("password", self.credentials.password()),
        ]);

        let response = Self::send_with_error_handling(request, LOGIN_ACTION, "POST").await?;
        let response = Self::check_response(response, LOGIN_ACTION).await?;
        let answer: LoginResponse = Self::parse_json(response, LOGIN_ACTION).await?;

        if answer.result != 0 {
            return Err(ApiError::Authentication {
                result: answer.result,
            });
        }
        if answer.jsession.is_empty() {
            return Err(ApiError::decode(LOGIN_ACTION, "login succeeded without a jsession"));
        }

        info!(account = %self.credentials.masked_account(), "Logged in to CMS gateway");
        Ok(answer.jsession)
    }

    /// 録画ファイル情報（エクスポート候補）を取得
    ///
    /// # Arguments
    /// * `device_id` - 端末番号（DevIDNO）
    /// * `channel` - チャンネル番号
    /// * `window` - 同じ日付に収まる検索窓
    pub async fn get_video_file_info(
        &self,
        device_id: &str,
        channel: u32,
        window: &ExportWindow,
    ) -> ApiResult<VideoFileInfoResponse> {
        let jsession = self.session().await?;
        let url = self.action_url(VIDEO_FILE_INFO_ACTION)?;
        let date = window.date();

        let params: Vec<(&str, String)> = vec![
            ("DevIDNO", device_id.to_string()),
            ("LOC", "1".to_string()),
            ("CHN", channel.to_string()),
            ("YEAR", date.year().to_string()),
            ("MON", date.month().to_string()),
            ("DAY", date.day().to_string()),
            ("RECTYPE", "-1".to_string()),
            ("FILEATTR", "2".to_string()),
            ("BEG", window.begin_seconds().to_string()),
            ("END", window.end_seconds().to_string()),
            ("ARM1", "0".to_string()),
            ("ARM2", "0".to_string()),
            ("RES", "0".to_string()),
            ("STREAM", "0".to_string()),
            ("STORE", "0".to_string()),
            ("jsession", jsession),
        ];

        debug!(
            device_id,
            channel,
            begin = window.begin_seconds(),
            end = window.end_seconds(),
            "Querying video file info"
        );

        let request = self
            .http
            .post(url)
            .header("user-agent", APP_CONFIG.api.video_info_user_agent)
            .query(&params);

        let response = Self::send_with_error_handling(request, VIDEO_FILE_INFO_ACTION, "POST").await?;
        let response = Self::check_response(response, VIDEO_FILE_INFO_ACTION).await?;
        let info: VideoFileInfoResponse = Self::parse_json(response, VIDEO_FILE_INFO_ACTION).await?;

        Self::check_result(VIDEO_FILE_INFO_ACTION, info.result)?;
        Ok(info)
    }

    /// エクスポートタスクの状態を1回問い合わせる
    ///
    /// 結果コードの解釈（処理中・完了・失敗）は呼び出し側が行う。
    pub async fn download_task_status(&self, task_url: &str) -> ApiResult<DownloadTaskResponse> {
        self.session().await?;
        let url = task_url::status_url(task_url, &self.api_base)?;

        let request = self.http.get(url);
        let response = Self::send_with_error_handling(request, EXPORT_STATUS_ENDPOINT, "GET").await?;
        let response = Self::check_response(response, EXPORT_STATUS_ENDPOINT).await?;
        let status: DownloadTaskResponse = Self::parse_json(response, EXPORT_STATUS_ENDPOINT).await?;

        debug!(result = status.result, "Export task status");
        Ok(status)
    }

    /// エクスポート済みファイルをダウンロードして保存する
    ///
    /// 保存名はサーバー側パスの最後の要素。レスポンスボディをそのまま書き込む。
    /// 受信中は `<保存名>.part` に書き、完了後に改名する。途中で失敗した場合は残さない。
    ///
    /// # Returns
    /// 保存したローカルファイルのパス
    pub async fn download(
        &self,
        device_id: &str,
        length: u64,
        server_path: &str,
    ) -> ApiResult<PathBuf> {
        let file_name = local_file_name(server_path)?;
        let jsession = self.session().await?;
        let url = self
            .download_base
            .join(DOWNLOAD_PATH)
            .map_err(|e| ApiError::transport(format!("Invalid download url: {}", e)))?;

        let params: Vec<(&str, String)> = vec![
            ("DownType", "3".to_string()),
            ("DevIDNO", device_id.to_string()),
            ("FILELOC", "1".to_string()),
            ("FLENGTH", length.to_string()),
            ("FOFFSET", "0".to_string()),
            ("FPATH", server_path.to_string()),
            ("MTYPE", "1".to_string()),
            ("SAVENAME", file_name.clone()),
            ("jsession", jsession),
        ];

        let request = self
            .http
            .get(url)
            .query(&params)
            .timeout(Duration::from_secs(APP_CONFIG.api.download_timeout_seconds));

        let response = Self::send_with_error_handling(request, DOWNLOAD_PATH, "GET").await?;
        let response = Self::check_response(response, DOWNLOAD_PATH).await?;

        let local_path = self.download_dir.join(&file_name);
        let part_path = self.download_dir.join(format!("{}.part", file_name));

        let written = match Self::write_body(response, &part_path).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&part_path).await {
                    debug!(file = %part_path.display(), error = %remove_err, "Partial file not removed");
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&part_path, &local_path).await.map_err(|e| {
            ApiError::io(format!("Failed to move download to {}", local_path.display()), e)
        })?;

        if written != length {
            warn!(
                file = %local_path.display(),
                expected = length,
                received = written,
                "Downloaded size differs from export length"
            );
        }

        info!(file = %local_path.display(), bytes = written, "Downloaded export");
        Ok(local_path)
    }

    /// レスポンスボディを `path` に書き込み、書き込んだバイト数を返す
    async fn write_body(mut response: Response, path: &Path) -> ApiResult<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| ApiError::io(format!("Failed to create {}", path.display()), e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ApiError::transport(format!("Download interrupted: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::io(format!("Failed to write {}", path.display()), e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::io(format!("Failed to write {}", path.display()), e))?;

        Ok(written)
    }

    /// 軌跡詳細を1ページ取得
    ///
    /// # Arguments
    /// * `page` - 1始まりのページ番号
    /// * `page_size` - 1ページあたりの件数
    pub async fn get_track_detail(
        &self,
        device_id: &str,
        page: u32,
        page_size: u32,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> ApiResult<TrackDetailResponse> {
        let jsession = self.session().await?;
        let url = self.action_url(TRACK_DETAIL_ACTION)?;

        let params: Vec<(&str, String)> = vec![
            ("jsession", jsession),
            ("devIdno", device_id.to_string()),
            ("begintime", format_timestamp(start)),
            ("endtime", format_timestamp(end)),
            ("currentPage", page.to_string()),
            ("pageRecords", page_size.to_string()),
        ];

        let request = self.http.get(url).query(&params);
        let response = Self::send_with_error_handling(request, TRACK_DETAIL_ACTION, "GET").await?;
        let response = Self::check_response(response, TRACK_DETAIL_ACTION).await?;
        let detail: TrackDetailResponse = Self::parse_json(response, TRACK_DETAIL_ACTION).await?;

        Self::check_result(TRACK_DETAIL_ACTION, detail.result)?;
        debug!(
            device_id,
            page = detail.pagination.current_page,
            total_pages = detail.pagination.total_pages,
            records = detail.tracks.len(),
            "Fetched track page"
        );
        Ok(detail)
    }

    /// 全ページの軌跡を取得して連結する
    ///
    /// 返り値の pagination は最後に取得したページのもの。
    pub async fn fetch_all_tracks(
        &self,
        device_id: &str,
        page_size: u32,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> ApiResult<TrackDetailResponse> {
        let mut page = 1;
        let mut all = TrackDetailResponse::default();

        loop {
            let detail = self
                .get_track_detail(device_id, page, page_size, start, end)
                .await?;
            let done = detail.tracks.is_empty() || page >= detail.pagination.total_pages;

            all.tracks.extend(detail.tracks);
            all.pagination = detail.pagination;

            if done {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// API ポート上のアクションURLを構築
    fn action_url(&self, action: &str) -> ApiResult<Url> {
        self.api_base
            .join(action)
            .map_err(|e| ApiError::transport(format!("Invalid url for {}: {}", action, e)))
    }

    /// リクエストを送信し、エラーハンドリングを行う
    async fn send_with_error_handling(
        request: RequestBuilder,
        endpoint: &str,
        method: &str,
    ) -> ApiResult<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::timeout(format!("{} {}", method, endpoint))
            } else if e.is_connect() {
                ApiError::transport(format!("Connection failed for {} {}: {}", method, endpoint, e))
            } else {
                ApiError::transport(format!("Request failed for {} {}: {}", method, endpoint, e))
            }
        })
    }

    /// ステータスが200以外ならボディを添えてエラーを返す
    async fn check_response(response: Response, endpoint: &str) -> ApiResult<Response> {
        let status = response.status();

        if status == reqwest::StatusCode::OK {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(ApiError::protocol(endpoint, status.as_u16(), body))
    }

    /// JSONレスポンスをデシリアライズ
    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: Response,
        endpoint: &str,
    ) -> ApiResult<T> {
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("Failed to read {} response: {}", endpoint, e)))?;

        serde_json::from_str(&body).map_err(|e| ApiError::decode(endpoint, e.to_string()))
    }

    fn check_result(endpoint: &str, result: u32) -> ApiResult<()> {
        if result != 0 {
            return Err(ApiError::Vendor {
                endpoint: endpoint.to_string(),
                result,
            });
        }
        Ok(())
    }
}

/// ベースURLをパースし、join で末尾が置き換わらないよう "/" で終わらせる
fn parse_base(base: &str) -> ApiResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| ApiError::transport(format!("Invalid gateway url '{}': {}", base, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// サーバー側パスから保存用のファイル名を取り出す
///
/// "/" と "\" のどちらも区切りとみなす。空・"."・".." は拒否する。
pub fn local_file_name(server_path: &str) -> ApiResult<String> {
    let name = server_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(ApiError::InvalidFilePath {
            path: server_path.to_string(),
        });
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::window::parse_timestamp;
    use mockito::{Matcher, Server, ServerGuard};
    use tempfile::TempDir;

    const LOGIN_OK: &str = r#"{"result": 0, "jsession": "sess-42"}"#;

    fn client_for(server: &ServerGuard, dir: &Path) -> CmsClient {
        CmsClient::new(
            &server.url(),
            &server.url(),
            Credentials::new("fleet".to_string(), "s3cret".to_string()),
            dir,
        )
        .expect("client should build")
    }

    async fn mock_login(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/StandardApiAction_login.action")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("account".into(), "fleet".into()),
                Matcher::UrlEncoded("password".into(), "s3cret".into()),
            ]))
            .with_status(200)
            .with_body(LOGIN_OK)
            .expect(hits)
            .create_async()
            .await
    }

    fn track_page(current: u32, total: u32, records: usize) -> String {
        let tracks: Vec<String> = (0..records)
            .map(|i| {
                format!(
                    r#"{{"id": "{}", "lng": 113926529, "lat": 22536142, "sp": 300, "s1": 1, "gt": "2024-03-01 10:00:0{}"}}"#,
                    i, i
                )
            })
            .collect();
        format!(
            r#"{{"result": 0, "pagination": {{"currentPage": {}, "totalPages": {}, "pageRecords": 2}}, "tracks": [{}]}}"#,
            current,
            total,
            tracks.join(",")
        )
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("/a/b/c/video123.h264").unwrap(), "video123.h264");
        assert_eq!(local_file_name("D:\\record\\ch1.264").unwrap(), "ch1.264");
        assert_eq!(local_file_name("plain.264").unwrap(), "plain.264");
        assert!(local_file_name("/a/b/").is_err());
        assert!(local_file_name("/a/..").is_err());
        assert!(local_file_name("").is_err());
    }

    #[test]
    fn test_parse_base_appends_slash() {
        let url = parse_base("http://gw:8080/cms").unwrap();
        assert_eq!(url.join(LOGIN_ACTION).unwrap().path(), "/cms/StandardApiAction_login.action");
    }

    #[tokio::test]
    async fn test_login_happens_once_across_calls() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let login = mock_login(&mut server, 1).await;
        let tracks = server
            .mock("GET", "/StandardApiAction_queryTrackDetail.action")
            .match_query(Matcher::UrlEncoded("jsession".into(), "sess-42".into()))
            .with_status(200)
            .with_body(track_page(1, 1, 1))
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let start = parse_timestamp("2024-03-01 10:00:00").unwrap();
        let end = parse_timestamp("2024-03-01 11:00:00").unwrap();
        client.get_track_detail("5001", 1, 2, &start, &end).await.unwrap();
        client.get_track_detail("5001", 1, 2, &start, &end).await.unwrap();

        login.assert_async().await;
        tracks.assert_async().await;
    }

    #[tokio::test]
    async fn test_reauthenticate_logs_in_again() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let login = mock_login(&mut server, 2).await;

        let client = client_for(&server, dir.path());
        assert_eq!(client.session().await.unwrap(), "sess-42");
        assert_eq!(client.reauthenticate().await.unwrap(), "sess-42");

        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _mock = server
            .mock("POST", "/StandardApiAction_login.action")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"result": 2}"#)
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let err = client.session().await.unwrap_err();

        assert!(matches!(err, ApiError::Authentication { result: 2 }));
    }

    #[tokio::test]
    async fn test_login_non_200_is_protocol_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _mock = server
            .mock("POST", "/StandardApiAction_login.action")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("gateway busy")
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        match client.session().await.unwrap_err() {
            ApiError::Protocol { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "gateway busy");
            }
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_malformed_json() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _mock = server
            .mock("POST", "/StandardApiAction_login.action")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>login</html>")
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let err = client.session().await.unwrap_err();

        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_video_file_info_parameters() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let lookup = server
            .mock("POST", "/StandardApiAction_getVideoFileInfc.action")
            .match_header("user-agent", "vscode-restclient")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("DevIDNO".into(), "5001".into()),
                Matcher::UrlEncoded("LOC".into(), "1".into()),
                Matcher::UrlEncoded("CHN".into(), "2".into()),
                Matcher::UrlEncoded("YEAR".into(), "2024".into()),
                Matcher::UrlEncoded("MON".into(), "3".into()),
                Matcher::UrlEncoded("DAY".into(), "1".into()),
                Matcher::UrlEncoded("RECTYPE".into(), "-1".into()),
                Matcher::UrlEncoded("FILEATTR".into(), "2".into()),
                Matcher::UrlEncoded("BEG".into(), "36000".into()),
                Matcher::UrlEncoded("END".into(), "36005".into()),
                Matcher::UrlEncoded("STORE".into(), "0".into()),
                Matcher::UrlEncoded("jsession".into(), "sess-42".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"result": 0, "Files": [{"DownTaskUrl": "/task?x=1"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let window = ExportWindow::new(
            parse_timestamp("2024-03-01 10:00:00").unwrap(),
            parse_timestamp("2024-03-01 10:00:05").unwrap(),
        )
        .unwrap();
        let info = client.get_video_file_info("5001", 2, &window).await.unwrap();

        assert_eq!(info.files().len(), 1);
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn test_video_file_info_vendor_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("POST", "/StandardApiAction_getVideoFileInfc.action")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"result": 5}"#)
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let at = parse_timestamp("2024-03-01 10:00:00").unwrap();
        let window = ExportWindow::new(at, at).unwrap();
        let err = client.get_video_file_info("5001", 0, &window).await.unwrap_err();

        assert!(matches!(err, ApiError::Vendor { result: 5, .. }));
    }

    #[tokio::test]
    async fn test_video_file_info_non_200() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("POST", "/StandardApiAction_getVideoFileInfc.action")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let at = parse_timestamp("2024-03-01 10:00:00").unwrap();
        let window = ExportWindow::new(at, at).unwrap();
        let err = client.get_video_file_info("5001", 0, &window).await.unwrap_err();

        match err {
            ApiError::Protocol { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_task_status_non_200() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("GET", "/StandardApiAction_addDownloadDTask.action")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let task_url = format!(
            "{}/StandardApiAction_addDownloadDTask.action?jsession=s&did=5001&fbtm=1&fetm=2\
             &sbtm=3&setm=4&fph=/mnt/rec/a.264&vtp=1&len=4096&chn=0&dtp=1",
            server.url()
        );
        let err = client.download_task_status(&task_url).await.unwrap_err();

        match err {
            ApiError::Protocol { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_track_detail_non_200() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("GET", "/StandardApiAction_queryTrackDetail.action")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("session expired")
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let start = parse_timestamp("2024-03-01 10:00:00").unwrap();
        let end = parse_timestamp("2024-03-01 11:00:00").unwrap();
        let err = client
            .get_track_detail("5001", 1, 100, &start, &end)
            .await
            .unwrap_err();

        match err {
            ApiError::Protocol { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "session expired");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_task_status_reencodes_query() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let status = server
            .mock("GET", "/StandardApiAction_addDownloadDTask.action")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("jsession".into(), "task-sess".into()),
                Matcher::UrlEncoded("did".into(), "5001".into()),
                Matcher::UrlEncoded("fph".into(), "/mnt/rec/a.264".into()),
                Matcher::UrlEncoded("dtp".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"result": 11, "oldTaskAll": {"dph": "/a/b/c/video123.h264", "len": 4096}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let task_url = format!(
            "{}/StandardApiAction_addDownloadDTask.action?jsession=task-sess&did=5001&fbtm=1&fetm=2\
             &sbtm=3&setm=4&fph=/mnt/rec/a.264&vtp=1&len=4096&chn=0&dtp=1&extra=zzz",
            server.url()
        );
        let response = client.download_task_status(&task_url).await.unwrap();

        assert_eq!(response.result, 11);
        status.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_writes_body_verbatim() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let body: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let download = server
            .mock("GET", "/3/5")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("DownType".into(), "3".into()),
                Matcher::UrlEncoded("DevIDNO".into(), "5001".into()),
                Matcher::UrlEncoded("FILELOC".into(), "1".into()),
                Matcher::UrlEncoded("FLENGTH".into(), "4096".into()),
                Matcher::UrlEncoded("FOFFSET".into(), "0".into()),
                Matcher::UrlEncoded("MTYPE".into(), "1".into()),
                Matcher::UrlEncoded("FPATH".into(), "/a/b/c/video123.h264".into()),
                Matcher::UrlEncoded("SAVENAME".into(), "video123.h264".into()),
                Matcher::UrlEncoded("jsession".into(), "sess-42".into()),
            ]))
            .with_status(200)
            .with_body(body.clone())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let path = client.download("5001", 4096, "/a/b/c/video123.h264").await.unwrap();

        assert_eq!(path, dir.path().join("video123.h264"));
        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert!(!dir.path().join("video123.h264.part").exists());
        download.assert_async().await;
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_file() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;

        // 4096 バイトと宣言して 10 バイトだけ送り、接続を閉じる
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let download_base = format!("http://{}", listener.local_addr().unwrap());
        let gateway = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\n0123456789")
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let client = CmsClient::new(
            &server.url(),
            &download_base,
            Credentials::new("fleet".to_string(), "s3cret".to_string()),
            dir.path(),
        )
        .unwrap();
        let err = client
            .download("5001", 4096, "/a/b/c/video123.h264")
            .await
            .unwrap_err();
        gateway.await.unwrap();

        assert!(matches!(err, ApiError::Transport { .. }));
        assert!(!dir.path().join("video123.h264").exists());
        assert!(!dir.path().join("video123.h264.part").exists());
    }

    #[tokio::test]
    async fn test_download_non_200() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("GET", "/3/5")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("no such file")
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let err = client.download("5001", 10, "/a/missing.264").await.unwrap_err();

        assert!(matches!(err, ApiError::Protocol { status: 404, .. }));
        assert!(!dir.path().join("missing.264").exists());
    }

    #[tokio::test]
    async fn test_download_rejects_traversal_without_request() {
        let server = Server::new_async().await;
        let dir = TempDir::new().unwrap();

        let client = client_for(&server, dir.path());
        let err = client.download("5001", 10, "/a/b/..").await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidFilePath { .. }));
    }

    #[tokio::test]
    async fn test_download_into_missing_dir_is_io_error() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("GET", "/3/5")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("data")
            .create_async()
            .await;

        let client = client_for(&server, &dir.path().join("does-not-exist"));
        let err = client.download("5001", 4, "/a/b.264").await.unwrap_err();

        assert!(matches!(err, ApiError::Io { .. }));
    }

    #[tokio::test]
    async fn test_track_detail_pages() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let _mock = server
            .mock("GET", "/StandardApiAction_queryTrackDetail.action")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("devIdno".into(), "5001".into()),
                Matcher::UrlEncoded("begintime".into(), "2024-03-01 10:00:00".into()),
                Matcher::UrlEncoded("endtime".into(), "2024-03-01 11:00:00".into()),
                Matcher::UrlEncoded("currentPage".into(), "2".into()),
                Matcher::UrlEncoded("pageRecords".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(track_page(2, 3, 2))
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/StandardApiAction_queryTrackDetail.action")
            .match_query(Matcher::UrlEncoded("currentPage".into(), "4".into()))
            .with_status(200)
            .with_body(track_page(4, 3, 0))
            .create_async()
            .await;

        let client = client_for(&server, dir.path());
        let start = parse_timestamp("2024-03-01 10:00:00").unwrap();
        let end = parse_timestamp("2024-03-01 11:00:00").unwrap();

        let page2 = client.get_track_detail("5001", 2, 2, &start, &end).await.unwrap();
        assert_eq!(page2.pagination.current_page, 2);
        assert!(!page2.tracks.is_empty());

        let beyond = client.get_track_detail("5001", 4, 2, &start, &end).await.unwrap();
        assert!(beyond.tracks.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_tracks() {
        let mut server = Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _login = mock_login(&mut server, 1).await;
        let mut pages = Vec::new();
        for page in 1..=3u32 {
            let mock = server
                .mock("GET", "/StandardApiAction_queryTrackDetail.action")
                .match_query(Matcher::UrlEncoded("currentPage".into(), page.to_string()))
                .with_status(200)
                .with_body(track_page(page, 3, if page == 3 { 1 } else { 2 }))
                .expect(1)
                .create_async()
                .await;
            pages.push(mock);
        }

        let client = client_for(&server, dir.path());
        let start = parse_timestamp("2024-03-01 10:00:00").unwrap();
        let end = parse_timestamp("2024-03-01 11:00:00").unwrap();
        let all = client.fetch_all_tracks("5001", 2, &start, &end).await.unwrap();

        assert_eq!(all.tracks.len(), 5);
        assert_eq!(all.pagination.total_pages, 3);
        for mock in pages {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let client = CmsClient::new(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            Credentials::new("fleet".to_string(), "s3cret".to_string()),
            dir.path(),
        )
        .unwrap();

        let err = client.session().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. } | ApiError::Timeout { .. }));
    }
}
