use crate::models::{DATE_COLUMN, MergedField, MergedRecord, Row};

/// Where a dataset keeps its date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateColumn {
    /// A column with this exact label.
    Named(String),
    /// Whatever the first column of each row is.
    FirstColumn,
    /// Either the first column or the named column matches.
    NamedOrFirst(String),
}

impl Default for DateColumn {
    fn default() -> Self {
        DateColumn::Named(DATE_COLUMN.to_string())
    }
}

impl DateColumn {
    fn matches(&self, row: &Row, date: &str) -> bool {
        let first = || row.first_column().is_some_and(|(_, v)| v == date);
        match self {
            DateColumn::Named(col) => row.get(col) == Some(date),
            DateColumn::FirstColumn => first(),
            DateColumn::NamedOrFirst(col) => first() || row.get(col) == Some(date),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub nutrition_date: DateColumn,
}

/// Fixed field pairings charted against each other.
pub const CHART_GROUPS: &[(&str, &[MergedField])] = &[
    (
        "Weight vs. Calories & Exercise",
        &[MergedField::Weight, MergedField::Calories, MergedField::ExerciseCalories],
    ),
    ("Weight vs. Protein", &[MergedField::Weight, MergedField::Protein]),
    ("Weight vs. Steps", &[MergedField::Weight, MergedField::Steps]),
    ("Calories vs. Steps", &[MergedField::Calories, MergedField::Steps]),
    ("Protein vs. Steps", &[MergedField::Protein, MergedField::Steps]),
    ("Sodium vs. Weight", &[MergedField::Sodium, MergedField::Weight]),
];

/// Join the three datasets on the measurement dates.
///
/// One record per measurement row with a date. Each record takes the first
/// nutrition row and the first exercise row for that date; fields whose source
/// row is missing stay `None`.
#[must_use]
pub fn merge_by_date(
    nutrition: &[Row],
    measurement: &[Row],
    exercise: &[Row],
    options: &MergeOptions,
) -> Vec<MergedRecord> {
    measurement
        .iter()
        .filter_map(|m| {
            let date = m.date()?;
            let food = nutrition
                .iter()
                .find(|n| options.nutrition_date.matches(n, date));
            let activity = exercise.iter().find(|e| e.get(DATE_COLUMN) == Some(date));

            Some(MergedRecord {
                date: date.to_string(),
                weight: m.number("Weight"),
                calories: food.map(macro_grams),
                protein: food.map(|n| n.number_or_zero("Protein (g)")),
                sodium: food.map(|n| n.number_or_zero("Sodium (mg)")),
                steps: activity.map(|e| e.number_or_zero("Steps")),
                exercise_calories: activity.map(|e| {
                    e.first_present(&["Exercise Calories", "Calories"])
                        .map_or(0.0, crate::normalize::number_or_zero)
                }),
            })
        })
        .collect()
}

/// Fat + carbohydrate + protein grams for one nutrition row.
fn macro_grams(row: &Row) -> f64 {
    let fat = row
        .first_present(&["Fat", "Fat (g)"])
        .map_or(0.0, crate::normalize::number_or_zero);
    fat + row.number_or_zero("Carbohydrates (g)") + row.number_or_zero("Protein (g)")
}

/// Records where every field in `fields` is present.
#[must_use]
pub fn complete_rows<'a>(merged: &'a [MergedRecord], fields: &[MergedField]) -> Vec<&'a MergedRecord> {
    merged
        .iter()
        .filter(|r| fields.iter().all(|f| r.get(*f).is_some()))
        .collect()
}

/// Mean of `field` over the records that have it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn field_mean(records: &[&MergedRecord], field: MergedField) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| r.get(field)).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
