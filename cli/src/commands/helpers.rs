use anyhow::Result;
use chrono::DateTime;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Columns},
};

use healthlens_core::models::{MergedField, Row};
use healthlens_core::summary::PLACEHOLDER;

/// Print rows as a table using the first row's columns as the header.
pub(crate) fn print_rows_table(rows: &[Row]) {
    let Some(first) = rows.first() else {
        return;
    };
    let headers: Vec<&str> = first.columns().collect();

    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(|h| truncate(h, 24)));
    for row in rows {
        builder.push_record(headers.iter().map(|h| truncate(row.get(h).unwrap_or(""), 24)));
    }

    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_right_aligned(mut table: tabled::Table, from_column: usize) {
    let table = table
        .with(Style::rounded())
        .with(Modify::new(Columns::new(from_column..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Comma-separated merged field names, e.g. `weight,steps`.
pub(crate) fn parse_fields(s: &str) -> Result<Vec<MergedField>> {
    s.split(',')
        .filter(|f| !f.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// A number with at most one decimal, trailing `.0` dropped.
pub(crate) fn fmt_number(v: f64) -> String {
    let v = no_neg_zero((v * 10.0).round() / 10.0);
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub(crate) fn fmt_optional(v: Option<f64>) -> String {
    v.map_or_else(|| PLACEHOLDER.to_string(), fmt_number)
}

/// RFC 3339 timestamp as local `YYYY-MM-DD HH:MM`, or the input unchanged.
pub(crate) fn fmt_timestamp(ts: &str) -> String {
    DateTime::parse_from_rfc3339(ts)
        .map_or_else(|_| ts.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

/// Show only the last four characters of a secret.
pub(crate) fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{tail}")
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
