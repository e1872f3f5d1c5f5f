use crate::commands::{self, CommandResult};
use crate::commands::export::ExportRequest;
use crate::commands::tracks::TracksRequest;
use crate::presentation::input;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CMS gateway client: export recorded video and query GPS tracks
#[derive(Parser, Debug)]
#[command(name = "cmsv6", version)]
pub struct Cli {
    /// Output machine-readable JSON to stdout (results and errors)
    #[arg(long, global = true)]
    pub machine: bool,

    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify CMS credentials and save them to the config file
    Login {
        /// Read account and password from stdin (line 1 = account, line 2 = password)
        #[arg(long)]
        stdin: bool,
    },

    /// Export, download and convert recordings for a time range
    Export {
        /// Device number (DevIDNO)
        #[arg(long)]
        device: String,

        /// Channel number
        #[arg(long)]
        channel: u32,

        /// Range start, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        start: String,

        /// Range stop (inclusive), "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        stop: String,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Query GPS track detail
    Tracks {
        /// Device number
        #[arg(long)]
        device: String,

        /// Range start, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        start: String,

        /// Range stop, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        stop: String,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Records per page
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
        page_size: u32,

        /// Fetch every page and concatenate the records
        #[arg(long, conflicts_with = "page")]
        all: bool,
    },
}

/// サブコマンドを実行する
pub async fn dispatch(cli: Cli) -> Result<CommandResult> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Login { stdin } => {
            let credentials = if stdin {
                input::read_credentials_from_stdin()?
            } else {
                input::read_credentials_interactive()?
            };
            commands::login::execute(credentials, config_path)
                .await
                .context("Login command failed")
        }
        Command::Export {
            device,
            channel,
            start,
            stop,
            timeout,
        } => {
            let cancel = cancellation(timeout.map(Duration::from_secs));
            let request = ExportRequest {
                device_id: device,
                channel,
                start,
                stop,
            };
            let result = commands::export::execute(request, config_path, &cancel)
                .await
                .context("Export command failed");
            cancel.cancel();
            result
        }
        Command::Tracks {
            device,
            start,
            stop,
            page,
            page_size,
            all,
        } => {
            let request = TracksRequest {
                device_id: device,
                start,
                stop,
                page,
                page_size,
                all,
            };
            commands::tracks::execute(request, config_path)
                .await
                .context("Tracks command failed")
        }
    }
}

/// Ctrl-C と任意の期限でキャンセルされるトークンを作成
///
/// 監視タスクはトークンがキャンセルされた時点で終了する。
fn cancellation(deadline: Option<Duration>) -> CancellationToken {
    let token = CancellationToken::new();

    let on_signal = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = on_signal.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Received Ctrl-C, cancelling"),
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
                }
                on_signal.cancel();
            }
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = on_deadline.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    warn!(secs = deadline.as_secs(), "Timeout reached, cancelling");
                    on_deadline.cancel();
                }
            }
        });
    }

    token
}
