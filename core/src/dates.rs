use chrono::{Datelike, Duration, NaiveDate};

const FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse an exporter date cell.
///
/// Accepts `YYYY-MM-DD`, `M/D/YYYY`, `YYYY/MM/DD`, `D.M.YYYY`, and timestamps
/// that start with an ISO date (`2024-01-15 08:30:00`, `2024-01-15T08:30`).
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// The Sunday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Short display label such as `Jan 2`; falls back to the raw text.
#[must_use]
pub fn short_label(raw: &str) -> String {
    parse_date(raw).map_or_else(|| raw.to_string(), |d| d.format("%b %-d").to_string())
}
