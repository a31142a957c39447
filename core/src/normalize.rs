//! Lenient numeric coercion for CSV cells.
//!
//! Exports leave cells blank on days nothing was logged and sometimes append
//! units (`"180 lbs"`). Nothing here fails: a cell either yields a number or
//! it does not, and the caller picks which absence policy applies.

/// Presence-sensitive parse. Blank, non-numeric and non-finite input is `None`.
///
/// A leading numeric prefix is accepted, so `"180 lbs"` reads as `180` and
/// `"1,200"` as `1`.
#[must_use]
pub fn number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    let end = numeric_prefix_len(s);
    if end == 0 {
        return None;
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Sum-safe parse: anything [`number`] rejects counts as `0`.
#[must_use]
pub fn number_or_zero(raw: &str) -> f64 {
    number(raw).unwrap_or(0.0)
}

/// Byte length of the longest `[+-]digits[.digits][e[+-]digits]` prefix.
fn numeric_prefix_len(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < b.len() && b[i] == b'.' {
        let mut j = i + 1;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - (i + 1);
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }

    if i < b.len() && matches!(b[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < b.len() && matches!(b[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}
