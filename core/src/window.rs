use std::collections::HashSet;

use crate::dates::parse_date;
use crate::models::Row;

/// Days of history sent along with an advice request.
pub const ADVICE_WINDOW_DAYS: usize = 14;

/// The rows for the most recent `n` distinct dates, oldest first.
///
/// Rows are ordered by parsed date (unparseable dates sort first, ties keep
/// file order). Walking back from the newest row, the first row seen for each
/// date is kept. Rows without a date are ignored.
#[must_use]
pub fn last_n_distinct_days(rows: &[Row], n: usize) -> Vec<Row> {
    let mut sorted: Vec<&Row> = rows.iter().collect();
    sorted.sort_by_key(|r| r.date().and_then(parse_date));

    let mut seen: HashSet<&str> = HashSet::new();
    let mut picked: Vec<&Row> = Vec::with_capacity(n.min(rows.len()));
    for row in sorted.into_iter().rev() {
        if picked.len() >= n {
            break;
        }
        if let Some(date) = row.date() {
            if seen.insert(date) {
                picked.push(row);
            }
        }
    }

    picked.into_iter().rev().cloned().collect()
}
