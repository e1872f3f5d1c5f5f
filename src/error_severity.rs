//! プレゼンテーション層が使用するエラー深刻度
//!
//! 終了コードの決定に使用される。
//! 内側の層（domain, api, config）はこのモジュールに依存してよいが、
//! このモジュールは他のモジュールに依存しない。

use std::fmt;

/// エラーの深刻度と対応する終了コード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// ユーザーの入力エラー
    ///
    /// 時刻範囲が不正、日付をまたぐ範囲指定など、ユーザーが直せるもの。
    ///
    /// **Exit Code: 1**
    UserError,

    /// 設定エラー
    ///
    /// ゲートウェイ未設定、アカウントが拒否されたなど、設定に問題がある。
    ///
    /// **Exit Code: 2**
    ConfigError,

    /// システムエラー
    ///
    /// ネットワーク障害、ゲートウェイの異常応答、ディスク書き込み失敗など。
    ///
    /// **Exit Code: 3**
    SystemError,

    /// 中断
    ///
    /// Ctrl-C または `--timeout` によるキャンセル。
    ///
    /// **Exit Code: 130**
    Cancelled,
}

impl ErrorSeverity {
    /// 対応する Unix 終了コードを返す
    pub fn exit_code(self) -> i32 {
        match self {
            Self::UserError => 1,
            Self::ConfigError => 2,
            Self::SystemError => 3,
            Self::Cancelled => 130,
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserError => write!(f, "user error"),
            Self::ConfigError => write!(f, "configuration error"),
            Self::SystemError => write!(f, "system error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
