//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a message timestamp into its local calendar date
///
/// Accepts RFC 3339 (`2024-02-14T00:01:00.000Z`) and the export format
/// `2024-02-14 00:01:00`. A bare `2024-02-14` is accepted as well.
/// RFC 3339 instants are converted to local time, the same clock the
/// dashboard's "today" comes from; the other forms are already local.
/// Returns `None` for anything else.
pub fn parse_message_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
