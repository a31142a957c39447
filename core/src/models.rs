use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::normalize;

/// Column every exporter is expected to carry the day in.
pub const DATE_COLUMN: &str = "Date";

/// One parsed CSV row: column label → raw cell text, in header order.
///
/// There is no fixed schema. Exporters disagree on column names and on which
/// columns exist at all, so access is by label and every numeric read goes
/// through [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, String)>,
}

/// One upload's rows, in file order.
pub type Dataset = Vec<Row>;

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, replacing an existing cell of the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        if let Some(cell) = self.columns.iter_mut().find(|(c, _)| *c == column) {
            cell.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// First column of the row as `(label, value)`.
    #[must_use]
    pub fn first_column(&self) -> Option<(&str, &str)> {
        self.columns
            .first()
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The row's `Date` cell, if present and non-blank.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.get(DATE_COLUMN).filter(|d| !d.trim().is_empty())
    }

    /// Presence-sensitive numeric read: blank or unparseable cells are `None`.
    #[must_use]
    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(normalize::number)
    }

    /// Sum-safe numeric read: blank, unparseable or missing cells are `0`.
    #[must_use]
    pub fn number_or_zero(&self, column: &str) -> f64 {
        self.get(column).map_or(0.0, normalize::number_or_zero)
    }

    /// First cell among `columns` that exists and is not blank.
    #[must_use]
    pub fn first_present(&self, columns: &[&str]) -> Option<&str> {
        columns
            .iter()
            .find_map(|c| self.get(c).filter(|v| !v.trim().is_empty()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (c, v) in &self.columns {
            map.serialize_entry(c, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to cell values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((k, v)) = access.next_entry::<String, CellValue>()? {
                    row.insert(k, v.0);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Accepts strings, numbers, booleans and null as a cell value.
struct CellValue(String);

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(CellValue(match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Nutrition,
    Measurement,
    Exercise,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Nutrition,
        DatasetKind::Measurement,
        DatasetKind::Exercise,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::Nutrition => "nutrition",
            DatasetKind::Measurement => "measurement",
            DatasetKind::Exercise => "exercise",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nutrition" | "food" => Ok(DatasetKind::Nutrition),
            "measurement" | "measurements" | "weight" => Ok(DatasetKind::Measurement),
            "exercise" | "activity" => Ok(DatasetKind::Exercise),
            _ => bail!("Invalid dataset '{s}'. Must be one of: nutrition, measurement, exercise"),
        }
    }
}

/// One date's summed metrics within a single dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub date: String,
    pub metrics: Vec<(String, f64)>,
}

impl AggregatedRecord {
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(m, _)| m == metric)
            .map(|(_, v)| *v)
    }

    /// Render back into a [`Row`] so window selection and prompt rendering
    /// can treat aggregated data like an upload.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = Row::new().with(DATE_COLUMN, self.date.clone());
        for (m, v) in &self.metrics {
            row.insert(m.clone(), v.to_string());
        }
        row
    }
}

impl Serialize for AggregatedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.metrics.len() + 1))?;
        map.serialize_entry("date", &self.date)?;
        for (m, v) in &self.metrics {
            map.serialize_entry(m, v)?;
        }
        map.end()
    }
}

/// One measurement day joined with that day's nutrition and exercise.
///
/// `None` means no source row existed for the day, which is not the same as
/// a logged zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedRecord {
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sodium: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise_calories: Option<f64>,
}

impl MergedRecord {
    #[must_use]
    pub fn get(&self, field: MergedField) -> Option<f64> {
        match field {
            MergedField::Weight => self.weight,
            MergedField::Calories => self.calories,
            MergedField::Protein => self.protein,
            MergedField::Sodium => self.sodium,
            MergedField::Steps => self.steps,
            MergedField::ExerciseCalories => self.exercise_calories,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergedField {
    Weight,
    Calories,
    Protein,
    Sodium,
    Steps,
    ExerciseCalories,
}

impl MergedField {
    pub const ALL: [MergedField; 6] = [
        MergedField::Weight,
        MergedField::Calories,
        MergedField::Protein,
        MergedField::Sodium,
        MergedField::Steps,
        MergedField::ExerciseCalories,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MergedField::Weight => "Weight",
            MergedField::Calories => "Total Macros (g)",
            MergedField::Protein => "Protein",
            MergedField::Sodium => "Sodium",
            MergedField::Steps => "Steps",
            MergedField::ExerciseCalories => "Exercise Calories",
        }
    }
}

impl FromStr for MergedField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "weight" => Ok(MergedField::Weight),
            "calories" => Ok(MergedField::Calories),
            "protein" => Ok(MergedField::Protein),
            "sodium" => Ok(MergedField::Sodium),
            "steps" => Ok(MergedField::Steps),
            "exercise_calories" | "exercisecalories" => Ok(MergedField::ExerciseCalories),
            _ => bail!(
                "Invalid field '{s}'. Must be one of: weight, calories, protein, sodium, steps, exercise_calories"
            ),
        }
    }
}

/// The three headings the advice prompt asks the model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceHeading {
    Nutrition,
    BodyMeasurements,
    ExerciseActivity,
}

impl AdviceHeading {
    pub const ALL: [AdviceHeading; 3] = [
        AdviceHeading::Nutrition,
        AdviceHeading::BodyMeasurements,
        AdviceHeading::ExerciseActivity,
    ];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            AdviceHeading::Nutrition => "## Nutrition Advice",
            AdviceHeading::BodyMeasurements => "## Body Measurements Advice",
            AdviceHeading::ExerciseActivity => "## Exercise Activity Advice",
        }
    }

    /// Short key used by report views: `nutrition`, `weight`, `activity`.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            AdviceHeading::Nutrition => "nutrition",
            AdviceHeading::BodyMeasurements => "weight",
            AdviceHeading::ExerciseActivity => "activity",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|h| h.key().eq_ignore_ascii_case(key) || h.title().eq_ignore_ascii_case(key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdviceSection {
    pub heading: AdviceHeading,
    /// Heading text as it appeared in the advice.
    pub title: String,
    pub content: String,
}

impl AdviceSection {
    /// Title without markdown hashes or a leading ordinal such as `1. `.
    #[must_use]
    pub fn clean_title(&self) -> &str {
        let t = self.title.trim_start_matches('#').trim_start();
        let digits = t.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 {
            if let Some(rest) = t[digits..].strip_prefix('.') {
                return rest.trim_start();
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_insert_replaces_existing() {
        let mut row = Row::new().with("Date", "2024-01-01").with("Weight", "180");
        row.insert("Weight", "181");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Weight"), Some("181"));
        assert_eq!(row.first_column(), Some(("Date", "2024-01-01")));
    }

    #[test]
    fn test_row_date_ignores_blank() {
        let row = Row::new().with("Date", "  ");
        assert!(row.date().is_none());
        assert!(Row::new().with("Weight", "1").date().is_none());
    }

    #[test]
    fn test_row_numbers() {
        let row = Row::new().with("Steps", "4000").with("Fat", "");
        assert_eq!(row.number("Steps"), Some(4000.0));
        assert_eq!(row.number("Fat"), None);
        assert!((row.number_or_zero("Fat")).abs() < f64::EPSILON);
        assert!((row.number_or_zero("Missing")).abs() < f64::EPSILON);
    }

    #[test]
    fn test_row_first_present_skips_blank() {
        let row = Row::new().with("Exercise Calories", "").with("Calories", "250");
        assert_eq!(
            row.first_present(&["Exercise Calories", "Calories"]),
            Some("250")
        );
    }

    #[test]
    fn test_row_json_keeps_column_order() {
        let row = Row::new().with("Date", "2024-01-01").with("Weight", "180");
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Date":"2024-01-01","Weight":"180"}"#);

        let back: Row = serde_json::from_str(r#"{"Date":"2024-01-01","Weight":180.5,"Note":null}"#).unwrap();
        assert_eq!(back.get("Weight"), Some("180.5"));
        assert_eq!(back.get("Note"), Some(""));
        assert_eq!(back.columns().collect::<Vec<_>>(), ["Date", "Weight", "Note"]);
    }

    #[test]
    fn test_dataset_kind_parse() {
        assert_eq!("Nutrition".parse::<DatasetKind>().unwrap(), DatasetKind::Nutrition);
        assert_eq!("weight".parse::<DatasetKind>().unwrap(), DatasetKind::Measurement);
        assert_eq!("activity".parse::<DatasetKind>().unwrap(), DatasetKind::Exercise);
        assert!("sleep".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn test_merged_field_parse() {
        assert_eq!("exercise-calories".parse::<MergedField>().unwrap(), MergedField::ExerciseCalories);
        assert_eq!("Steps".parse::<MergedField>().unwrap(), MergedField::Steps);
        assert!("bmi".parse::<MergedField>().is_err());
    }

    #[test]
    fn test_merged_record_skips_absent_fields_in_json() {
        let rec = MergedRecord {
            date: "2024-01-01".into(),
            weight: Some(180.0),
            ..MergedRecord::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json, serde_json::json!({ "date": "2024-01-01", "weight": 180.0 }));
    }

    #[test]
    fn test_aggregated_record_to_row() {
        let rec = AggregatedRecord {
            date: "2024-01-01".into(),
            metrics: vec![("Protein (g)".into(), 50.0)],
        };
        let row = rec.to_row();
        assert_eq!(row.date(), Some("2024-01-01"));
        assert_eq!(row.number("Protein (g)"), Some(50.0));
    }

    #[test]
    fn test_advice_heading_from_key() {
        assert_eq!(AdviceHeading::from_key("nutrition"), Some(AdviceHeading::Nutrition));
        assert_eq!(AdviceHeading::from_key("weight"), Some(AdviceHeading::BodyMeasurements));
        assert_eq!(AdviceHeading::from_key("Activity"), Some(AdviceHeading::ExerciseActivity));
        assert_eq!(
            AdviceHeading::from_key("## exercise activity advice"),
            Some(AdviceHeading::ExerciseActivity)
        );
        assert_eq!(AdviceHeading::from_key("sleep"), None);
    }

    #[test]
    fn test_clean_title_strips_ordinal() {
        let s = AdviceSection {
            heading: AdviceHeading::Nutrition,
            title: "## 1. Nutrition Advice".into(),
            content: String::new(),
        };
        assert_eq!(s.clean_title(), "Nutrition Advice");
    }
}
