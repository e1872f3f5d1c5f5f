mod api;
mod cli;
mod commands;
mod config;
mod domain;
mod error_severity;
mod presentation;

use anyhow::Result;
use api::error::ApiError;
use clap::Parser;
use config::APP_CONFIG;
use config::error::ConfigError;
use domain::error::DomainError;
use domain::transcoder::TranscodeError;
use error_severity::ErrorSeverity;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let machine_output = cli.machine;

    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        handle_error(e, machine_output);
    }
}

/// ログ出力を初期化（stderr。stdout は --machine の JSON 用）
fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        APP_CONFIG.logging.verbose_filter
    } else {
        APP_CONFIG.logging.default_filter
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// アプリケーションのメイン処理
async fn run(cli: cli::Cli) -> Result<()> {
    let machine_output = cli.machine;
    let result = cli::dispatch(cli).await?;
    presentation::output::output_result(&result, machine_output)
}

/// エラーハンドリングとユーザーへの表示
///
/// anyhow::Error から元のエラー型を downcast して、
/// エラーの種類に応じた exit code とメッセージを決定する。
fn handle_error(error: anyhow::Error, machine_output: bool) {
    let exit_code = determine_exit_code(&error);
    let hint = get_error_hint(&error);

    if machine_output {
        if let Err(e) =
            presentation::output::output_error_machine(&error, exit_code, hint.as_deref())
        {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(exit_code);
    }

    eprintln!("Error: {}", error);

    let chain: Vec<_> = error.chain().skip(1).collect();
    if !chain.is_empty() {
        eprintln!("\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            eprintln!("  {}: {}", i + 1, cause);
        }
    }

    if let Some(hint) = hint {
        eprintln!("\nHint: {}", hint);
    }

    std::process::exit(exit_code);
}

/// エラーチェーンから適切な終了コードを決定
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(domain_err) = cause.downcast_ref::<DomainError>() {
            return domain_err.severity().exit_code();
        }
        if let Some(api_err) = cause.downcast_ref::<ApiError>() {
            return api_err.severity().exit_code();
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return config_err.severity().exit_code();
        }
        if cause.downcast_ref::<TranscodeError>().is_some() {
            return ErrorSeverity::SystemError.exit_code();
        }
    }

    ErrorSeverity::UserError.exit_code()
}

/// エラーに対するユーザー向けヒントを取得
fn get_error_hint(error: &anyhow::Error) -> Option<String> {
    for cause in error.chain() {
        if let Some(domain_err) = cause.downcast_ref::<DomainError>() {
            if let Some(hint) = domain_err.hint() {
                return Some(hint.to_string());
            }
        }
        if let Some(api_err) = cause.downcast_ref::<ApiError>() {
            if let Some(hint) = api_err.hint() {
                return Some(hint.to_string());
            }
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            if let Some(hint) = config_err.hint() {
                return Some(hint.to_string());
            }
        }
    }

    None
}
