/// ドメインサービス: 時刻範囲とエクスポート窓
///
/// ゲートウェイの録画検索は年・月・日を1回だけ、開始と終了を
/// 「その日の0時からの秒数」で受け取る。そのため1回の検索は同じ日付に
/// 収まっている必要がある。長い範囲を一度に検索すると結果が欠けるため、
/// 固定長の窓に区切って順に検索する。
use crate::domain::error::DomainError;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// ゲートウェイとやり取りする時刻の書式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CLI で受け付ける時刻文字列をパース
///
/// "2024-03-01 10:00:00" と "2024-03-01T10:00:00" の両方を受け付ける。
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, DomainError> {
    let trimmed = input.trim();
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| DomainError::invalid_timestamp(input))
}

/// ゲートウェイ向けの書式で時刻を文字列化
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// 0時からの経過秒数
pub fn seconds_of_day(time: &NaiveDateTime) -> u32 {
    time.num_seconds_from_midnight()
}

/// 検証済みの時刻範囲（start <= stop）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveDateTime,
    stop: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, stop: NaiveDateTime) -> Result<Self, DomainError> {
        if start > stop {
            return Err(DomainError::InvalidTimeRange {
                start: format_timestamp(&start),
                stop: format_timestamp(&stop),
            });
        }
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn stop(&self) -> NaiveDateTime {
        self.stop
    }

    /// 範囲を `step` ごとの窓に区切る
    ///
    /// 窓の開始が `stop` を超えた時点で終了する（`stop` ちょうどに始まる窓は含む）。
    /// 日付をまたぐ窓はその日の 23:59:59 で打ち切る。
    /// 窓が作れない場合（`step` が負）はエラーを1つ返して終了する。
    pub fn windows(&self, step: Duration) -> Windows {
        Windows {
            next: self.start,
            stop: self.stop,
            step,
        }
    }
}

/// 録画検索1回分の窓（同じ日付に収まる）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl ExportWindow {
    /// 窓を作成
    ///
    /// 終了が開始より前、または終了が翌日以降の場合はエラー。
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidTimeRange {
                start: format_timestamp(&start),
                stop: format_timestamp(&end),
            });
        }
        if start.date() != end.date() {
            return Err(DomainError::CrossesMidnight {
                start: format_timestamp(&start),
                end: format_timestamp(&end),
            });
        }
        Ok(Self { start, end })
    }

    /// 長さ `length` の窓を作成し、日付をまたぐ分は切り詰める
    pub fn clamped(start: NaiveDateTime, length: Duration) -> Result<Self, DomainError> {
        let end_of_day = start.date().and_time(last_second_of_day());
        Self::new(start, (start + length).min(end_of_day))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// `BEG` パラメータ
    pub fn begin_seconds(&self) -> u32 {
        seconds_of_day(&self.start)
    }

    /// `END` パラメータ
    pub fn end_seconds(&self) -> u32 {
        seconds_of_day(&self.end)
    }
}

fn last_second_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

/// [`TimeRange::windows`] のイテレータ
#[derive(Debug, Clone)]
pub struct Windows {
    next: NaiveDateTime,
    stop: NaiveDateTime,
    step: Duration,
}

impl Iterator for Windows {
    type Item = Result<ExportWindow, DomainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.stop {
            return None;
        }
        let window = ExportWindow::clamped(self.next, self.step);
        self.next = match window {
            Ok(_) => self.next + self.step,
            Err(_) => self.stop + Duration::seconds(1),
        };
        Some(window)
    }
}
