use std::collections::HashMap;

use serde::Serialize;

use crate::models::{AggregatedRecord, Row};

/// Nutrition columns summed before nutrition data is sent for advice.
pub const NUTRITION_FIELDS: &[&str] = &[
    "Fat (g)",
    "Carbohydrates (g)",
    "Protein (g)",
    "Sugar",
    "Fiber",
    "Sodium (mg)",
    "Cholesterol",
];

/// Nutrition columns charted per day.
pub const NUTRITION_CHART_FIELDS: &[&str] = &[
    "Fat",
    "Carbohydrates (g)",
    "Protein (g)",
    "Sugar",
    "Fiber",
    "Sodium (mg)",
    "Cholesterol",
];

pub const EXERCISE_FIELDS: &[&str] = &["Exercise Calories", "Exercise Minutes", "Steps"];

/// The macro columns of [`NUTRITION_CHART_FIELDS`].
pub const MACRO_FIELDS: &[&str] = &["Fat", "Carbohydrates (g)", "Protein (g)"];

/// Group rows by their exact `Date` string and sum `fields` per group.
///
/// Blank, unparseable and missing cells add `0`. Rows without a date are
/// skipped. Records come out in order of each date's first appearance.
#[must_use]
pub fn aggregate_by_date(rows: &[Row], fields: &[&str]) -> Vec<AggregatedRecord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<AggregatedRecord> = Vec::new();

    for row in rows {
        let Some(date) = row.date() else {
            continue;
        };
        let slot = *index.entry(date).or_insert_with(|| {
            out.push(AggregatedRecord {
                date: date.to_string(),
                metrics: fields.iter().map(|f| ((*f).to_string(), 0.0)).collect(),
            });
            out.len() - 1
        });
        for (metric, total) in &mut out[slot].metrics {
            *total += row.number_or_zero(metric);
        }
    }

    out
}

/// Aggregated records rendered back into rows.
#[must_use]
pub fn aggregate_rows(rows: &[Row], fields: &[&str]) -> Vec<Row> {
    aggregate_by_date(rows, fields)
        .iter()
        .map(AggregatedRecord::to_row)
        .collect()
}

#[must_use]
pub fn nutrition_daily(rows: &[Row]) -> Vec<AggregatedRecord> {
    aggregate_by_date(rows, NUTRITION_CHART_FIELDS)
}

/// Mean daily value of each of `fields` across `records`.
///
/// A metric a record lacks counts as `0`; no records gives all zeros.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_metrics(records: &[AggregatedRecord], fields: &[&str]) -> Vec<(String, f64)> {
    let days = records.len();
    fields
        .iter()
        .map(|f| {
            let total: f64 = records.iter().filter_map(|r| r.get(f)).sum();
            let avg = if days == 0 { 0.0 } else { total / days as f64 };
            ((*f).to_string(), avg)
        })
        .collect()
}

/// Average daily fat, carbohydrate and protein grams.
#[must_use]
pub fn macro_averages(rows: &[Row]) -> Vec<(String, f64)> {
    average_metrics(&nutrition_daily(rows), MACRO_FIELDS)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExercisePoint {
    pub date: String,
    pub calories: f64,
    pub minutes: f64,
    pub steps: f64,
}

#[must_use]
pub fn exercise_daily(rows: &[Row]) -> Vec<ExercisePoint> {
    aggregate_by_date(rows, EXERCISE_FIELDS)
        .into_iter()
        .map(|r| ExercisePoint {
            calories: r.get("Exercise Calories").unwrap_or_default(),
            minutes: r.get("Exercise Minutes").unwrap_or_default(),
            steps: r.get("Steps").unwrap_or_default(),
            date: r.date,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightPoint {
    pub date: String,
    pub weight: f64,
}

/// Per-row weight readings, in file order. Rows without a usable weight are
/// dropped rather than plotted as zero.
#[must_use]
pub fn measurement_series(rows: &[Row]) -> Vec<WeightPoint> {
    rows.iter()
        .filter_map(|r| {
            Some(WeightPoint {
                weight: r.number("Weight")?,
                date: r.date().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, pairs: &[(&str, &str)]) -> Row {
        let mut r = Row::new().with("Date", date);
        for (k, v) in pairs {
            r.insert(*k, *v);
        }
        r
    }

    #[test]
    fn test_aggregate_sums_same_date() {
        let rows = vec![
            row("2024-01-01", &[("Protein (g)", "20")]),
            row("2024-01-01", &[("Protein (g)", "30")]),
        ];
        let out = aggregate_by_date(&rows, &["Protein (g)"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, "2024-01-01");
        assert!((out[0].get("Protein (g)").unwrap() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_keeps_first_occurrence_order() {
        let rows = vec![
            row("2024-01-03", &[("Steps", "1")]),
            row("2024-01-01", &[("Steps", "2")]),
            row("2024-01-03", &[("Steps", "3")]),
            row("2024-01-02", &[("Steps", "4")]),
        ];
        let dates: Vec<String> = aggregate_by_date(&rows, &["Steps"])
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, ["2024-01-03", "2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn test_aggregate_blank_and_missing_count_as_zero() {
        let rows = vec![
            row("2024-01-01", &[("Fat (g)", "5"), ("Sugar", "")]),
            row("2024-01-01", &[("Fat (g)", "oops")]),
            row("2024-01-01", &[("Sugar", "7")]),
        ];
        let out = aggregate_by_date(&rows, &["Fat (g)", "Sugar", "Fiber"]);
        assert_eq!(out.len(), 1);
        assert!((out[0].get("Fat (g)").unwrap() - 5.0).abs() < f64::EPSILON);
        assert!((out[0].get("Sugar").unwrap() - 7.0).abs() < f64::EPSILON);
        assert!((out[0].get("Fiber").unwrap()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_empty_inputs() {
        assert!(aggregate_by_date(&[], &["Steps"]).is_empty());

        let rows = vec![row("2024-01-01", &[]), row("2024-01-02", &[]), row("2024-01-01", &[])];
        let out = aggregate_by_date(&rows, &[]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.metrics.is_empty()));
    }

    #[test]
    fn test_aggregate_skips_rows_without_date() {
        let rows = vec![
            Row::new().with("Steps", "100"),
            row("", &[("Steps", "100")]),
            row("2024-01-01", &[("Steps", "100")]),
        ];
        let out = aggregate_by_date(&rows, &["Steps"]);
        assert_eq!(out.len(), 1);
        assert!((out[0].get("Steps").unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_macro_averages_per_day() {
        let rows = vec![
            row("2024-01-01", &[("Fat", "10"), ("Protein (g)", "30")]),
            row("2024-01-01", &[("Fat", "10"), ("Carbohydrates (g)", "100")]),
            row("2024-01-02", &[("Fat", "40"), ("Protein (g)", "50")]),
        ];
        let avg = macro_averages(&rows);
        assert_eq!(avg.len(), 3);
        assert_eq!(avg[0].0, "Fat");
        assert!((avg[0].1 - 30.0).abs() < f64::EPSILON);
        assert!((avg[1].1 - 50.0).abs() < f64::EPSILON);
        assert!((avg[2].1 - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_metrics_empty() {
        let avg = average_metrics(&[], &["Steps"]);
        assert_eq!(avg, vec![("Steps".to_string(), 0.0)]);
    }

    #[test]
    fn test_exercise_daily() {
        let rows = vec![
            row("2024-01-01", &[("Exercise Calories", "200"), ("Exercise Minutes", "30"), ("Steps", "5000")]),
            row("2024-01-01", &[("Exercise Calories", "100"), ("Steps", "1000")]),
        ];
        let points = exercise_daily(&rows);
        assert_eq!(points.len(), 1);
        assert!((points[0].calories - 300.0).abs() < f64::EPSILON);
        assert!((points[0].minutes - 30.0).abs() < f64::EPSILON);
        assert!((points[0].steps - 6000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_measurement_series_drops_missing_weight() {
        let rows = vec![
            row("2024-01-01", &[("Weight", "180")]),
            row("2024-01-02", &[("Weight", "")]),
            row("2024-01-03", &[("Weight", "179.4")]),
        ];
        let series = measurement_series(&rows);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].date, "2024-01-03");
        assert!((series[1].weight - 179.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_rows_round_trip_into_rows() {
        let rows = vec![row("2024-01-01", &[("Steps", "10")]), row("2024-01-01", &[("Steps", "5")])];
        let out = aggregate_rows(&rows, EXERCISE_FIELDS);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].number("Steps"), Some(15.0));
        assert_eq!(out[0].number("Exercise Minutes"), Some(0.0));
    }
}
