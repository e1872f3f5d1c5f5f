/// アプリケーション設定モジュール
///
/// コンパイル時定数として定義される静的設定を管理します。
/// これらの設定は実行時には変更できません。

/// アプリケーション全体の設定
#[derive(Debug, Clone, Copy)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// API関連の設定
#[derive(Debug, Clone, Copy)]
pub struct ApiConfig {
    /// API リクエストのタイムアウト(秒)
    pub timeout_seconds: u64,

    /// ファイルダウンロードのタイムアウト(秒)
    pub download_timeout_seconds: u64,

    /// 既定の API ポート
    pub default_api_port: u16,

    /// 既定のダウンロードポート
    pub default_download_port: u16,

    /// 録画検索に付与する User-Agent（ゲートウェイがこの値を受け付ける）
    pub video_info_user_agent: &'static str,
}

/// エクスポート関連の設定
#[derive(Debug, Clone, Copy)]
pub struct ExportConfig {
    /// 録画検索1回あたりの窓の長さ(秒)
    pub window_seconds: i64,

    /// 最初の状態確認までの待機(秒)
    pub initial_poll_delay_seconds: u64,

    /// 既定のトランスコーダ
    pub default_transcoder: &'static str,

    /// トランスコード後の拡張子
    pub output_extension: &'static str,
}

/// ロギング関連の設定
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig {
    /// RUST_LOG 未指定時のフィルタ
    pub default_filter: &'static str,

    /// --verbose 指定時のフィルタ
    pub verbose_filter: &'static str,
}

/// グローバルなアプリケーション設定
pub const APP_CONFIG: AppConfig = AppConfig {
    api: ApiConfig {
        timeout_seconds: 30,
        download_timeout_seconds: 600,
        default_api_port: 8080,
        default_download_port: 6611,
        video_info_user_agent: "vscode-restclient",
    },
    export: ExportConfig {
        window_seconds: 5,
        initial_poll_delay_seconds: 180,
        default_transcoder: "ffmpeg",
        output_extension: "mp4",
    },
    logging: LoggingConfig {
        default_filter: "info",
        verbose_filter: "cmsv6=debug,info",
    },
};
