use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::utils::clean_str;

/// Parse a feed timestamp with the configured chrono pattern
/// (`%m/%d/%Y %I:%M:%S %p` for the incident feeds). Anything that does not
/// match is `None`.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let c = clean_str(raw);
    if c.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(&c, format)
        .ok()
        .filter(|dt| in_key_range(dt.date()))
}

/// Hourly weather timestamps: ISO `2023-07-04T14:00`, with or without seconds,
/// or a space instead of the `T`.
pub fn parse_iso_hour(raw: &str) -> Option<NaiveDateTime> {
    let c = clean_str(raw);
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&c, fmt).ok())
        .filter(|dt| in_key_range(dt.date()))
}

/// Four-digit positive years only; `%Y` otherwise accepts signed years of
/// any width, which do not fit a `YYYYMMDD` key.
pub fn in_key_range(date: NaiveDate) -> bool {
    (1..=9999).contains(&date.year())
}

/// Naive wall-clock time → Arrow millisecond timestamp (no zone).
pub fn to_millis(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|d| d.naive_utc())
}

/// `YYYYMMDD` as an integer, `None` for years outside 1..=9999.
pub fn date_key(date: NaiveDate) -> Option<i32> {
    if !in_key_range(date) {
        return None;
    }
    date.year()
        .checked_mul(10_000)?
        .checked_add(date.month() as i32 * 100 + date.day() as i32)
}

/// `(date_key, hour)` of a millisecond timestamp.
pub fn date_key_and_hour(ms: i64) -> Option<(i32, i8)> {
    let dt = from_millis(ms)?;
    Some((date_key(dt.date())?, dt.hour() as i8))
}

/// Days since the Unix epoch, as stored in Arrow `Date32`.
pub fn to_date32(date: NaiveDate) -> i32 {
    const UNIX_EPOCH_FROM_CE: i32 = 719_163;
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}
