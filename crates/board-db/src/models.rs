//! Database row types. These map directly to SQLite rows.
//! Distinct from board-types API models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_verified: bool,
    pub category: String,
    pub fingerprint: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fixed-width UTC timestamps so lexical order in SQLite matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` format
/// ("YYYY-MM-DD HH:MM:SS", no timezone, taken as UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc()))
        .map_err(|e| anyhow!("Bad timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        let s = format_timestamp(ts);
        assert_eq!(s, "2026-03-01T12:30:05.000000Z");
        assert_eq!(parse_timestamp(&s).unwrap(), ts);
    }

    #[test]
    fn sqlite_default_format_is_utc() {
        let ts = parse_timestamp("2026-03-01 12:30:05").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
