/// エクスポートタスクURLの再エンコード
///
/// 録画ファイル情報で返る `DownTaskUrl` は、そのままではゲートウェイに
/// 受け付けられない。パスはそのままに、クエリを固定の許可リストだけで
/// 組み立て直す。
use crate::api::error::ApiError;
use reqwest::Url;

/// 状態問い合わせに渡すパラメータ（キー順にソート済み）
pub const STATUS_QUERY_KEYS: [&str; 11] = [
    "chn", "did", "dtp", "fbtm", "fetm", "fph", "jsession", "len", "sbtm", "setm", "vtp",
];

/// `DownTaskUrl` から状態問い合わせ用のURLを組み立てる
///
/// 相対URLの場合は `api_base` を基準に解決する。
/// 許可リストのキーが1つでも欠けていればエラー。
pub fn status_url(raw: &str, api_base: &Url) -> Result<Url, ApiError> {
    // 絶対URLなら join はそのURLをそのまま返す
    let mut url = api_base.join(raw).map_err(|e| ApiError::InvalidTaskUrl {
        message: format!("{}: {}", raw, e),
    })?;

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut selected = Vec::with_capacity(STATUS_QUERY_KEYS.len());
    for key in STATUS_QUERY_KEYS {
        let value = pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ApiError::InvalidTaskUrl {
                message: format!("missing '{}' parameter in {}", key, raw),
            })?;
        selected.push((key, value));
    }

    url.set_query(None);
    url.query_pairs_mut().extend_pairs(selected);

    Ok(url)
}
