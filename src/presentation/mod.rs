/// プレゼンテーション層モジュール
///
/// コマンドの結果とユーザー入力を CLI 上の表現に変換します。
///
/// # モジュール
/// - `input`: ユーザー入力処理（資格情報）
/// - `output`: コマンド結果・エラーの出力（人間向け・機械向け）
pub mod input;
pub mod output;
