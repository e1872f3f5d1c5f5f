/// プレゼンテーション層: コマンド結果の出力
///
/// コマンド実行結果をユーザー向け（人間可読）または
/// 機械向け（JSON）形式で出力する責務を担います。
/// 人間向けはすべて stderr、機械向けは stdout に出力します。
use crate::commands::result::CommandResult;
use anyhow::Result;

/// コマンド結果を適切な形式で出力する
///
/// # Arguments
/// * `result` - コマンド実行結果
/// * `machine_output` - 機械可読出力フラグ
pub fn output_result(result: &CommandResult, machine_output: bool) -> Result<()> {
    if machine_output {
        println!("{}", machine_readable(result)?);
    } else {
        output_human_readable(result);
    }
    Ok(())
}

/// 人間向けの詳細メッセージを出力（stderr）
fn output_human_readable(result: &CommandResult) {
    match result {
        CommandResult::Login(r) => {
            eprintln!();
            eprintln!("{}", result.success_message());
            eprintln!("Account: {}", r.account);
            eprintln!("Credentials have been saved.");
        }
        CommandResult::Export(r) => {
            eprintln!();
            eprintln!(
                "Device {} channel {}: {} .. {}",
                r.device_id, r.channel, r.start, r.stop
            );
            eprintln!(
                "Windows queried: {}, export tasks: {}",
                r.summary.windows, r.summary.tasks
            );
            for path in &r.summary.downloaded {
                eprintln!("  downloaded {}", path.display());
            }
            for path in &r.summary.converted {
                eprintln!("  converted  {}", path.display());
            }
            if r.summary.transcode_failures > 0 {
                eprintln!(
                    "{} file(s) could not be converted; the raw files were kept.",
                    r.summary.transcode_failures
                );
            }
            eprintln!();
            eprintln!("{}", result.success_message());
        }
        CommandResult::Tracks(r) => {
            eprintln!();
            eprintln!(
                "Device {}: page {}/{} ({} per page)",
                r.device_id,
                r.pagination.current_page,
                r.pagination.total_pages,
                r.pagination.page_records
            );
            for track in &r.tracks {
                eprintln!(
                    "{}  lng={} lat={} speed={} status={:#x}",
                    track.time, track.lng, track.lat, track.speed, track.status_register
                );
            }
            eprintln!("{}", result.success_message());
        }
    }
}

/// 機械可読JSONを生成
///
/// 成功時は `success: true` とコマンド名を含む。
fn machine_readable(result: &CommandResult) -> Result<String> {
    let mut json = serde_json::to_value(result)?;
    if let Some(object) = json.as_object_mut() {
        object.insert("success".to_string(), serde_json::Value::Bool(true));
    }
    Ok(serde_json::to_string(&json)?)
}

/// エラーを機械可読JSONで出力（stdout）
pub fn output_error_machine(
    error: &anyhow::Error,
    exit_code: i32,
    hint: Option<&str>,
) -> Result<()> {
    println!("{}", error_json(error, exit_code, hint)?);
    Ok(())
}

fn error_json(error: &anyhow::Error, exit_code: i32, hint: Option<&str>) -> Result<String> {
    let causes: Vec<String> = error.chain().skip(1).map(|c| c.to_string()).collect();
    let json = serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "causes": causes,
        "exit_code": exit_code,
        "hint": hint,
    });
    Ok(serde_json::to_string(&json)?)
}
