/// トランスコーダ
///
/// ダウンロードした生ファイルを標準コンテナ（MP4）に変換する外部ツールとの境界。
/// エクスポート処理からはこのトレイト越しに呼び出し、プロセス起動の詳細を持ち込まない。
use crate::config::APP_CONFIG;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TranscodeError {
    /// 実行ファイルが見つからない・起動できない
    #[error("failed to start transcoder '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 0以外の終了コード
    #[error("transcoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// 出力先が入力と同じになる
    #[error("output path would overwrite input {path}")]
    SameOutput { path: String },
}

/// 変換処理の境界
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// `input` を変換し、出力ファイルのパスを返す
    async fn convert(&self, input: &Path) -> Result<PathBuf, TranscodeError>;
}

/// 外部コマンド（既定は ffmpeg）による変換
///
/// `<program> -i <input> <stem>.mp4` を入力と同じディレクトリで実行する。
#[derive(Debug, Clone)]
pub struct CommandTranscoder {
    program: String,
    extension: String,
}

impl CommandTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extension: APP_CONFIG.export.output_extension.to_string(),
        }
    }

    /// 出力ファイルのパス（拡張子だけを置き換える）
    pub fn output_path(&self, input: &Path) -> Result<PathBuf, TranscodeError> {
        let output = input.with_extension(&self.extension);
        if output == input {
            return Err(TranscodeError::SameOutput {
                path: input.display().to_string(),
            });
        }
        Ok(output)
    }

    fn args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-i"),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ]
    }
}

impl Default for CommandTranscoder {
    fn default() -> Self {
        Self::new(APP_CONFIG.export.default_transcoder)
    }
}

#[async_trait]
impl Transcoder for CommandTranscoder {
    async fn convert(&self, input: &Path) -> Result<PathBuf, TranscodeError> {
        let output = self.output_path(input)?;
        let args = Self::args(input, &output);
        debug!(program = %self.program, ?args, "Running transcoder");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(TranscodeError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}
