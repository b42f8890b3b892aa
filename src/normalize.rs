/// Reading normalizer: raw API records → uniform `{time, value}` rows.
///
/// Timestamps are treated as UTC throughout. An explicit offset is applied
/// before the zone marker is dropped, so `"2024-01-01T01:00:00+01:00"` and
/// `"2024-01-01T00:00:00Z"` both normalize to `"2024-01-01 00:00:00"`.

use crate::model::{RawReading, Reading};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Output format for every normalized timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Normalizes an ISO 8601 timestamp to `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Accepts, in order:
/// 1. RFC 3339 with `Z` or a numeric offset (converted to UTC)
/// 2. a naive ISO timestamp with one trailing zone letter, e.g. `...00Z`
///    as some feeds emit with fractional seconds
/// 3. an already normalized `YYYY-MM-DD HH:MM:SS` string (returned as-is)
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string());
    }

    let naive_part = raw
        .strip_suffix(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw);

    NaiveDateTime::parse_from_str(naive_part, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive_part, TIMESTAMP_FORMAT))
        .ok()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Extracts a finite numeric value; anything else yields `None`.
pub fn normalize_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

/// Normalizes one raw record, or `None` if its time or value is unusable.
pub fn normalize(raw: &RawReading) -> Option<Reading> {
    let Some(timestamp) = normalize_timestamp(&raw.date_time) else {
        tracing::debug!(date_time = %raw.date_time, "dropping reading with unparseable dateTime");
        return None;
    };
    let Some(value) = normalize_value(&raw.value) else {
        tracing::debug!(%timestamp, value = %raw.value, "dropping reading with non-numeric value");
        return None;
    };

    Some(Reading { timestamp, value })
}

/// Normalizes a sequence of raw records, preserving input order and
/// filtering out malformed rows.
pub fn normalize_all<'a, I>(raws: I) -> Vec<Reading>
where
    I: IntoIterator<Item = &'a RawReading>,
{
    raws.into_iter().filter_map(normalize).collect()
}

/// True if the rows are in non-decreasing time order. The zero-padded
/// timestamp format sorts lexically in time order.
pub fn is_chronological(readings: &[Reading]) -> bool {
    readings
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
