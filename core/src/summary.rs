//! Headline figures for the report cards.
//!
//! Every calculator returns `None` when the data can't support a figure; the
//! report renders that as [`PLACEHOLDER`]. Columns are found by keyword
//! ("contains, case-insensitive") against the first row's columns, so
//! `"step"` also matches a column such as `Footsteps Index`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use serde::Serialize;

use crate::dates::{parse_date, short_label, week_start};
use crate::models::Row;

pub const DEFAULT_CALORIE_GOAL: f64 = 1800.0;
pub const PLACEHOLDER: &str = "-";

/// First column of the first row whose label contains `keyword`.
#[must_use]
pub fn keyword_column<'a>(rows: &'a [Row], keyword: &str) -> Option<&'a str> {
    let keyword = keyword.to_lowercase();
    rows.first()?
        .columns()
        .find(|c| c.to_lowercase().contains(&keyword))
}

/// Per-date sums of `column`, in first-seen order. Rows without a date or a
/// usable value are skipped.
fn daily_totals(rows: &[Row], column: &str) -> Vec<(String, f64)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(String, f64)> = Vec::new();
    for row in rows {
        let (Some(date), Some(value)) = (row.date(), row.number(column)) else {
            continue;
        };
        let slot = *index.entry(date).or_insert_with(|| {
            totals.push((date.to_string(), 0.0));
            totals.len() - 1
        });
        totals[slot].1 += value;
    }
    totals
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    Some(values.sum::<f64>() / n as f64)
}

/// Half-up rounding to a whole number, so `-2.5` becomes `-2`.
fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

fn thousands(v: f64) -> String {
    (round_half_up(v) as i64).to_formatted_string(&Locale::en)
}

fn signed(v: f64, text: &str) -> String {
    if v > 0.0 {
        format!("+{text}")
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestDay {
    pub date: String,
    pub value: f64,
}

/// Date with the largest daily total for the keyword column.
#[must_use]
pub fn best_day(rows: &[Row], keyword: &str) -> Option<BestDay> {
    let column = keyword_column(rows, keyword)?;
    let mut best: Option<(String, f64)> = None;
    for (date, total) in daily_totals(rows, column) {
        if total > best.as_ref().map_or(0.0, |b| b.1) {
            best = Some((date, total));
        }
    }
    best.map(|(date, value)| BestDay { date, value })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub first: f64,
    pub last: f64,
    pub change: f64,
    /// Change relative to `first`; `None` when `first` is zero.
    pub percent: Option<f64>,
}

/// Difference between the earliest and latest usable values of `column`.
///
/// Only rows with both a value and a parseable date count.
#[must_use]
pub fn first_last_delta(rows: &[Row], column: &str) -> Option<Delta> {
    let mut readings: Vec<(NaiveDate, f64)> = rows
        .iter()
        .filter_map(|r| {
            let date = r.date().and_then(parse_date)?;
            Some((date, r.number(column)?))
        })
        .collect();
    if readings.len() < 2 {
        return None;
    }
    readings.sort_by_key(|(d, _)| *d);

    let first = readings[0].1;
    let last = readings[readings.len() - 1].1;
    let change = last - first;
    Some(Delta {
        first,
        last,
        change,
        percent: (first != 0.0).then(|| change / first * 100.0),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalComparison {
    pub average: f64,
    pub goal: f64,
    /// Deviation from `goal` in percent; `None` for a non-positive goal.
    pub percent: Option<f64>,
}

/// Average daily total of the keyword column against a fixed goal.
#[must_use]
pub fn average_vs_goal(rows: &[Row], keyword: &str, goal: f64) -> Option<GoalComparison> {
    let column = keyword_column(rows, keyword)?;
    let totals = daily_totals(rows, column);
    let average = mean(totals.iter().map(|(_, t)| *t))?;
    Some(GoalComparison {
        average,
        goal,
        percent: (goal > 0.0).then(|| (average - goal) / goal * 100.0),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deviation {
    pub date: String,
    pub total: f64,
    /// `total` minus the mean of all daily totals.
    pub deviation: f64,
}

/// The day whose total strays furthest from the mean daily total.
#[must_use]
pub fn largest_deviation(rows: &[Row], keyword: &str) -> Option<Deviation> {
    let column = keyword_column(rows, keyword)?;
    let totals = daily_totals(rows, column);
    let avg = mean(totals.iter().map(|(_, t)| *t))?;

    let mut found: Option<Deviation> = None;
    for (date, total) in totals {
        let deviation = total - avg;
        if deviation.abs() > found.as_ref().map_or(0.0, |f| f.deviation.abs()) {
            found = Some(Deviation {
                date,
                total,
                deviation,
            });
        }
    }
    found
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekOverWeek {
    pub this_week: NaiveDate,
    pub last_week: NaiveDate,
    /// Change in average daily calories.
    pub calories: Option<f64>,
    /// Change in average daily steps.
    pub steps: Option<f64>,
    /// Change in the week's latest weight.
    pub weight: Option<f64>,
}

/// Daily totals of the keyword column grouped into Sunday-started weeks.
fn weekly_totals(rows: &[Row], keyword: &str) -> BTreeMap<NaiveDate, Vec<f64>> {
    let mut weeks: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    let Some(column) = keyword_column(rows, keyword) else {
        return weeks;
    };
    for (date, total) in daily_totals(rows, column) {
        if let Some(d) = parse_date(&date) {
            weeks.entry(week_start(d)).or_default().push(total);
        }
    }
    weeks
}

/// Compare the two most recent weeks that have any nutrition, exercise or
/// weight data.
#[must_use]
pub fn week_over_week(nutrition: &[Row], measurement: &[Row], exercise: &[Row]) -> Option<WeekOverWeek> {
    let calories = weekly_totals(nutrition, "calorie");
    let steps = weekly_totals(exercise, "step");

    let mut weights: BTreeMap<NaiveDate, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for row in measurement {
        let (Some(d), Some(w)) = (row.date().and_then(parse_date), row.number("Weight")) else {
            continue;
        };
        weights.entry(week_start(d)).or_default().push((d, w));
    }

    let mut weeks: Vec<NaiveDate> = calories
        .keys()
        .chain(steps.keys())
        .chain(weights.keys())
        .copied()
        .collect();
    weeks.sort_unstable_by(|a, b| b.cmp(a));
    weeks.dedup();
    let (&this_week, &last_week) = (weeks.first()?, weeks.get(1)?);

    let avg_delta = |map: &BTreeMap<NaiveDate, Vec<f64>>| -> Option<f64> {
        let now = mean(map.get(&this_week)?.iter().copied())?;
        let before = mean(map.get(&last_week)?.iter().copied())?;
        Some(now - before)
    };
    let latest = |week: &NaiveDate| -> Option<f64> {
        weights.get(week)?.iter().max_by_key(|(d, _)| *d).map(|(_, w)| *w)
    };

    Some(WeekOverWeek {
        this_week,
        last_week,
        calories: avg_delta(&calories),
        steps: avg_delta(&steps),
        weight: latest(&this_week).zip(latest(&last_week)).map(|(a, b)| a - b),
    })
}

impl fmt::Display for WeekOverWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = |d: Option<f64>| match d.filter(|v| *v != 0.0) {
            Some(v) => signed(v, &format!("{}", round_half_up(v))),
            None => PLACEHOLDER.to_string(),
        };
        let weight = match self.weight.filter(|v| *v != 0.0) {
            Some(v) => signed(v, &format!("{v:.1}")),
            None => PLACEHOLDER.to_string(),
        };
        write!(
            f,
            "Calories: {} avg | Steps: {} avg | Weight: {weight} lbs",
            whole(self.calories),
            whole(self.steps)
        )
    }
}

/// The five report cards for one snapshot of the datasets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub best_step_day: Option<BestDay>,
    pub weight_change: Option<Delta>,
    pub calories_vs_goal: Option<GoalComparison>,
    pub calorie_spike: Option<Deviation>,
    pub week_over_week: Option<WeekOverWeek>,
}

impl HealthReport {
    #[must_use]
    pub fn build(nutrition: &[Row], measurement: &[Row], exercise: &[Row], calorie_goal: f64) -> Self {
        Self {
            best_step_day: best_day(exercise, "step"),
            weight_change: first_last_delta(measurement, "Weight"),
            calories_vs_goal: average_vs_goal(nutrition, "calorie", calorie_goal),
            calorie_spike: largest_deviation(nutrition, "calorie"),
            week_over_week: week_over_week(nutrition, measurement, exercise),
        }
    }

    /// `(title, text)` for each card, with [`PLACEHOLDER`] where data is missing.
    #[must_use]
    pub fn cards(&self) -> Vec<(&'static str, String)> {
        let or_placeholder = |v: Option<String>| v.unwrap_or_else(|| PLACEHOLDER.to_string());

        let best = self
            .best_step_day
            .as_ref()
            .map(|b| format!("{} steps ({})", thousands(b.value), short_label(&b.date)));

        let weight = self.weight_change.as_ref().map(|d| {
            let pct = d.percent.map_or_else(
                || PLACEHOLDER.to_string(),
                |p| signed(p, &format!("{p:.1}")),
            );
            format!("{} lbs ({pct}%)", signed(d.change, &format!("{:.1}", d.change)))
        });

        let goal = self.calories_vs_goal.as_ref().map(|g| {
            let pct = g.percent.map_or_else(
                || PLACEHOLDER.to_string(),
                |p| if p >= 0.0 { format!("+{p:.1}") } else { format!("{p:.1}") },
            );
            format!("{} / {} Calories ({pct}%)", thousands(g.average), g.goal)
        });

        let spike = self.calorie_spike.as_ref().map(|d| {
            format!(
                "{} Calories ({})",
                round_half_up(d.deviation.abs()),
                short_label(&d.date)
            )
        });

        vec![
            ("Best Step Day", or_placeholder(best)),
            ("Weight Change", or_placeholder(weight)),
            ("Avg Daily Calories vs. Goal", or_placeholder(goal)),
            ("Largest Calorie Spike", or_placeholder(spike)),
            (
                "This Week vs. Last Week",
                or_placeholder(self.week_over_week.as_ref().map(ToString::to_string)),
            ),
        ]
    }
}
