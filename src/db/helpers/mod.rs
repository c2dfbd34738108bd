use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

/// Fixed-width UTC RFC3339, so stored timestamps sort lexicographically.
/// Only holds for years 0000..=9999, see [`clamp_storable`].
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn storable_bounds() -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let min = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).single()?;
    let max = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).single()?
        + Duration::microseconds(999_999);
    Some((min, max))
}

/// Years outside 0000..=9999 are written with a sign and would sort before
/// every four-digit year.
pub fn is_storable(value: DateTime<Utc>) -> bool {
    storable_bounds().is_some_and(|(min, max)| min <= value && value <= max)
}

/// Pulls a query bound into the storable range.
pub fn clamp_storable(value: DateTime<Utc>) -> DateTime<Utc> {
    match storable_bounds() {
        Some((min, max)) => value.clamp(min, max),
        None => value,
    }
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("{field} value {value} is out of range"))
}
