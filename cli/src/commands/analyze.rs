use std::process;

use anyhow::{Result, bail};
use serde::Serialize;
use tabled::{Table, Tabled};

use healthlens_core::aggregate::{exercise_daily, macro_averages, measurement_series, nutrition_daily};
use healthlens_core::merge::{CHART_GROUPS, complete_rows, field_mean};
use healthlens_core::models::{DatasetKind, MergedField, MergedRecord, Row};
use healthlens_core::service::HealthService;
use healthlens_core::window::last_n_distinct_days;

use super::helpers::{fmt_number, fmt_optional, print_json, print_right_aligned, print_rows_table};

fn exit_if_empty(rows: &[Row], kind: DatasetKind) {
    if rows.is_empty() {
        eprintln!("No {kind} data. Use `healthlens import {kind} <file>` to load a CSV export.");
        process::exit(2);
    }
}

pub(crate) fn cmd_aggregate(service: &HealthService, kind: DatasetKind, averages: bool, json: bool) -> Result<()> {
    if averages && kind != DatasetKind::Nutrition {
        bail!("--averages is only available for nutrition data");
    }
    let rows = service.dataset(kind)?;
    if !json {
        exit_if_empty(&rows, kind);
    }

    if averages {
        return print_macro_averages(&rows, json);
    }

    match kind {
        DatasetKind::Nutrition => {
            let daily = nutrition_daily(&rows);
            if json {
                return print_json(&daily);
            }
            let table: Vec<Row> = daily
                .iter()
                .map(|r| {
                    let mut row = Row::new().with("Date", r.date.clone());
                    for (metric, value) in &r.metrics {
                        row.insert(metric.clone(), fmt_number(*value));
                    }
                    row
                })
                .collect();
            print_rows_table(&table);
        }
        DatasetKind::Exercise => {
            let daily = exercise_daily(&rows);
            if json {
                return print_json(&daily);
            }

            #[derive(Tabled)]
            struct ExerciseRow {
                #[tabled(rename = "Date")]
                date: String,
                #[tabled(rename = "Exercise Calories")]
                calories: String,
                #[tabled(rename = "Minutes")]
                minutes: String,
                #[tabled(rename = "Steps")]
                steps: String,
            }

            let table: Vec<ExerciseRow> = daily
                .iter()
                .map(|p| ExerciseRow {
                    date: p.date.clone(),
                    calories: fmt_number(p.calories),
                    minutes: fmt_number(p.minutes),
                    steps: fmt_number(p.steps),
                })
                .collect();
            print_right_aligned(Table::new(&table), 1);
        }
        DatasetKind::Measurement => {
            let series = measurement_series(&rows);
            if json {
                return print_json(&series);
            }

            #[derive(Tabled)]
            struct WeightRow {
                #[tabled(rename = "Date")]
                date: String,
                #[tabled(rename = "Weight")]
                weight: String,
            }

            let table: Vec<WeightRow> = series
                .iter()
                .map(|p| WeightRow {
                    date: p.date.clone(),
                    weight: fmt_number(p.weight),
                })
                .collect();
            print_right_aligned(Table::new(&table), 1);
        }
    }

    Ok(())
}

fn print_macro_averages(rows: &[Row], json: bool) -> Result<()> {
    let averages = macro_averages(rows);
    if json {
        let value: Vec<_> = averages
            .iter()
            .map(|(metric, average)| serde_json::json!({ "metric": metric, "average": average }))
            .collect();
        return print_json(&value);
    }

    #[derive(Tabled)]
    struct AverageRow {
        #[tabled(rename = "Macro")]
        metric: String,
        #[tabled(rename = "Daily average (g)")]
        average: String,
    }

    let table: Vec<AverageRow> = averages
        .into_iter()
        .map(|(metric, average)| AverageRow {
            metric,
            average: fmt_number(average),
        })
        .collect();
    print_right_aligned(Table::new(&table), 1);
    Ok(())
}

#[derive(Debug, Serialize)]
struct GroupSummary {
    group: &'static str,
    days: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_weight: Option<f64>,
}

/// Usable days per standard comparison, with the mean weight over those days
/// when the comparison includes weight.
fn group_summaries(merged: &[MergedRecord]) -> Vec<GroupSummary> {
    CHART_GROUPS
        .iter()
        .map(|(title, fields)| {
            let rows = complete_rows(merged, fields);
            let avg_weight = if fields.contains(&MergedField::Weight) {
                field_mean(&rows, MergedField::Weight)
            } else {
                None
            };
            GroupSummary {
                group: *title,
                days: rows.len(),
                avg_weight,
            }
        })
        .collect()
}

pub(crate) fn cmd_merge(
    service: &HealthService,
    complete: &[MergedField],
    groups: bool,
    json: bool,
) -> Result<()> {
    let merged = service.merged()?;

    if groups {
        let summaries = group_summaries(&merged);
        if json {
            return print_json(&summaries);
        }

        #[derive(Tabled)]
        struct GroupRow {
            #[tabled(rename = "Comparison")]
            title: String,
            #[tabled(rename = "Days with data")]
            days: usize,
            #[tabled(rename = "Avg weight")]
            avg_weight: String,
        }

        let rows: Vec<GroupRow> = summaries
            .into_iter()
            .map(|s| GroupRow {
                title: s.group.to_string(),
                days: s.days,
                avg_weight: fmt_optional(s.avg_weight),
            })
            .collect();
        print_right_aligned(Table::new(&rows), 1);
        return Ok(());
    }

    let records: Vec<&MergedRecord> = complete_rows(&merged, complete);

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        eprintln!("No merged days. Import measurement data first; merging follows its dates.");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct MergedRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Macros (g)")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Sodium")]
        sodium: String,
        #[tabled(rename = "Steps")]
        steps: String,
        #[tabled(rename = "Exercise Cal")]
        exercise_calories: String,
    }

    let rows: Vec<MergedRow> = records
        .iter()
        .map(|r| MergedRow {
            date: r.date.clone(),
            weight: fmt_optional(r.weight),
            calories: fmt_optional(r.calories),
            protein: fmt_optional(r.protein),
            sodium: fmt_optional(r.sodium),
            steps: fmt_optional(r.steps),
            exercise_calories: fmt_optional(r.exercise_calories),
        })
        .collect();
    print_right_aligned(Table::new(&rows), 1);
    if let Some(avg) = field_mean(&records, MergedField::Weight) {
        println!("Average weight: {}", fmt_number(avg));
    }

    Ok(())
}

pub(crate) fn cmd_window(service: &HealthService, kind: DatasetKind, days: usize, json: bool) -> Result<()> {
    let rows = service.dataset(kind)?;
    let recent = last_n_distinct_days(&rows, days);

    if json {
        return print_json(&recent);
    }

    exit_if_empty(&recent, kind);
    print_rows_table(&recent);
    Ok(())
}
