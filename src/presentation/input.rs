/// プレゼンテーション層: ユーザー入力処理
///
/// 対話入力や stdin から CMS の資格情報を取得し、
/// コマンド層で使用可能な形式に変換します。
use crate::commands::login::LoginCredentials;
use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};

/// 対話的に認証情報を取得
pub fn read_credentials_interactive() -> Result<LoginCredentials> {
    eprintln!("Logging in to the CMS gateway...");
    eprintln!();

    let stdin = io::stdin();
    let mut input = stdin.lock();

    eprint!("Account: ");
    io::stderr().flush()?;
    let account = read_field(&mut input, "account")?;

    eprint!("Password: ");
    io::stderr().flush()?;
    let password = read_field(&mut input, "password")?;

    Ok(LoginCredentials { account, password })
}

/// stdin からパイプで認証情報を取得（2行形式）
///
/// 形式:
///   1行目: アカウント
///   2行目: パスワード
pub fn read_credentials_from_stdin() -> Result<LoginCredentials> {
    let stdin = io::stdin();
    parse_credentials(stdin.lock())
}

fn parse_credentials(mut input: impl BufRead) -> Result<LoginCredentials> {
    let account = read_field(&mut input, "account")?;
    let password = read_field(&mut input, "password")?;
    Ok(LoginCredentials { account, password })
}

fn read_field(input: &mut impl BufRead, name: &str) -> Result<String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .with_context(|| format!("Failed to read {} from input", name))?;

    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("{} cannot be empty.", name);
    }
    Ok(value)
}
