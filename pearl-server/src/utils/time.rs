//! 时间工具函数 — 业务时区与班次窗口
//!
//! 所有时间戳统一为 Unix millis，repository 层只接收 `i64`；
//! 日期/时刻解析与时区换算集中在这里。

use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// 解析时刻字符串 (HH:MM)，失败返回 00:00
pub fn parse_hhmm(value: &str) -> NaiveTime {
    NaiveTime::parse_from_str(value, "%H:%M").unwrap_or_else(|e| {
        tracing::warn!("Failed to parse time '{}': {}, falling back to 00:00", value, e);
        NaiveTime::MIN
    })
}

/// 日期 + 时刻 → Unix millis (业务时区)
///
/// DST gap fallback: 如果本地时间不存在 (夏令时跳跃)，fallback 到 UTC。
pub fn date_time_to_millis(date: NaiveDate, time: NaiveTime, tz: Tz) -> i64 {
    let naive = date.and_time(time);
    naive
        .and_local_timezone(tz)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// 班次窗口是否包含给定时刻
///
/// 窗口从 `work_date` 的 `start` 开始；当 `end <= start` 时窗口跨午夜，
/// 结束时刻落在次日。
pub fn shift_window_contains(
    now: DateTime<Tz>,
    work_date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
) -> bool {
    let start_ms = date_time_to_millis(work_date, start, tz);
    let end_date = if end <= start {
        work_date + Duration::days(1)
    } else {
        work_date
    };
    let end_ms = date_time_to_millis(end_date, end, tz);

    let now_ms = now.timestamp_millis();
    now_ms >= start_ms && now_ms < end_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TZ: Tz = chrono_tz::Asia::Ho_Chi_Minh;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        TZ.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn window_contains_daytime_shift() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let start = parse_hhmm("08:00");
        let end = parse_hhmm("17:00");

        assert!(shift_window_contains(local(2026, 3, 10, 12, 0), date, start, end, TZ));
        assert!(!shift_window_contains(local(2026, 3, 10, 7, 59), date, start, end, TZ));
        assert!(!shift_window_contains(local(2026, 3, 10, 17, 0), date, start, end, TZ));
    }

    #[test]
    fn window_spans_midnight_when_end_not_after_start() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let start = parse_hhmm("22:00");
        let end = parse_hhmm("06:00");

        // Late evening of the work date
        assert!(shift_window_contains(local(2026, 3, 10, 23, 30), date, start, end, TZ));
        // Early morning of the following day
        assert!(shift_window_contains(local(2026, 3, 11, 5, 59), date, start, end, TZ));
        // Past the end of the extended window
        assert!(!shift_window_contains(local(2026, 3, 11, 6, 0), date, start, end, TZ));
        // Before the shift opened
        assert!(!shift_window_contains(local(2026, 3, 10, 21, 59), date, start, end, TZ));
    }

    #[test]
    fn parse_hhmm_falls_back_to_midnight() {
        assert_eq!(parse_hhmm("not-a-time"), NaiveTime::MIN);
        assert_eq!(parse_hhmm("09:30"), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2026-13-40").is_err());
        assert!(parse_date("2026-03-10").is_ok());
    }
}
