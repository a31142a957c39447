use anyhow::Result;

use crate::aggregate::{EXERCISE_FIELDS, NUTRITION_FIELDS, aggregate_rows};
use crate::csv_import::csv_text;
use crate::models::{AdviceHeading, AdviceSection, Row};
use crate::window::{ADVICE_WINDOW_DAYS, last_n_distinct_days};

/// Datasets longer than this are summed per day before windowing.
pub const AGGREGATE_THRESHOLD: usize = 40;

pub const ADVICE_SYSTEM_PROMPT: &str =
    "You are a certified nutritionist helping a client interpret their health data.";

/// Split advice text at the three recognized headings.
///
/// Headings match case-insensitively. Each body runs to the next heading or
/// the end of the text, is trimmed, and loses one leading `## ...` line if the
/// model repeated a heading. Text without any heading yields no sections.
#[must_use]
pub fn split_advice_sections(text: &str) -> Vec<AdviceSection> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut found: Vec<(usize, AdviceHeading)> = Vec::new();
    for heading in AdviceHeading::ALL {
        let needle = heading.title().to_ascii_lowercase();
        found.extend(lower.match_indices(&needle).map(|(i, _)| (i, heading)));
    }
    found.sort_by_key(|(i, _)| *i);

    found
        .iter()
        .enumerate()
        .map(|(n, &(start, heading))| {
            let title_end = start + heading.title().len();
            let end = found.get(n + 1).map_or(text.len(), |(next, _)| *next);
            AdviceSection {
                heading,
                title: text[start..title_end].to_string(),
                content: strip_heading_line(text[title_end..end].trim()).to_string(),
            }
        })
        .collect()
}

/// Drop a leading heading: `##`, whitespace (line breaks included), then
/// text up to the end of that line. `body` is already trimmed.
fn strip_heading_line(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("##") else {
        return body;
    };
    let line = rest.trim_start();
    if line.len() == rest.len() || line.is_empty() {
        return body;
    }
    match line.find('\n') {
        Some(nl) => &line[nl + 1..],
        None => "",
    }
}

/// Section for a short key (`nutrition`, `weight`, `activity`) or a full
/// heading. `None` when the key is unknown or the advice lacks that section.
#[must_use]
pub fn find_section<'a>(sections: &'a [AdviceSection], key: &str) -> Option<&'a AdviceSection> {
    let heading = AdviceHeading::from_key(key)?;
    sections.iter().find(|s| s.heading == heading)
}

/// Recent data prepared for the advice prompt.
fn recent(rows: &[Row], fields: Option<&[&str]>) -> Vec<Row> {
    match fields {
        Some(fields) if rows.len() > AGGREGATE_THRESHOLD => {
            last_n_distinct_days(&aggregate_rows(rows, fields), ADVICE_WINDOW_DAYS)
        }
        _ => last_n_distinct_days(rows, ADVICE_WINDOW_DAYS),
    }
}

/// Build the nutritionist prompt from the trailing 14 days of each dataset.
pub fn advice_prompt(nutrition: &[Row], measurement: &[Row], exercise: &[Row]) -> Result<String> {
    let nutrition_text = csv_text(&recent(nutrition, Some(NUTRITION_FIELDS)))?;
    let measurement_text = csv_text(&recent(measurement, None))?;
    let exercise_text = csv_text(&recent(exercise, Some(EXERCISE_FIELDS)))?;

    let headings = AdviceHeading::ALL.map(AdviceHeading::title).join(", ");

    Ok(format!(
        "You are a certified nutritionist. The following is a summary of a client's nutrition, \
measurement, and exercise data (CSV format). Please provide:
- Specific, actionable, and constructive feedback for each section.
- Minimize generic encouragement; focus on what the user can do to improve.
- For each section, include at least one concrete suggestion or action step.
- Use the following exact markdown headings for each section: {headings}.
- Present your advice as if you were speaking directly to the client, in a professional and concise tone.

Nutrition Data:
{nutrition_text}

Measurement Data:
{measurement_text}

Exercise Data:
{exercise_text}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADVICE: &str = "Here is my take.

## Nutrition Advice
Eat more fiber.

## Body Measurements Advice
Weigh in weekly.

## Exercise Activity Advice
Walk after dinner.";

    #[test]
    fn test_split_all_sections_in_order() {
        let sections = split_advice_sections(ADVICE);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, AdviceHeading::Nutrition);
        assert_eq!(sections[0].content, "Eat more fiber.");
        assert_eq!(sections[1].heading, AdviceHeading::BodyMeasurements);
        assert_eq!(sections[1].content, "Weigh in weekly.");
        assert_eq!(sections[2].heading, AdviceHeading::ExerciseActivity);
        assert_eq!(sections[2].content, "Walk after dinner.");
    }

    #[test]
    fn test_split_no_headings() {
        assert!(split_advice_sections("Just keep going!").is_empty());
        assert!(split_advice_sections("").is_empty());
        assert!(split_advice_sections("# Nutrition Advice\nsingle hash").is_empty());
    }

    #[test]
    fn test_split_case_insensitive_keeps_source_title() {
        let sections = split_advice_sections("## EXERCISE ACTIVITY ADVICE\nMove.\n## nutrition advice\nEat.");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, AdviceHeading::ExerciseActivity);
        assert_eq!(sections[0].title, "## EXERCISE ACTIVITY ADVICE");
        assert_eq!(sections[0].content, "Move.");
        assert_eq!(sections[1].heading, AdviceHeading::Nutrition);
        assert_eq!(sections[1].content, "Eat.");
    }

    #[test]
    fn test_split_strips_duplicate_heading_line() {
        let text = "## Nutrition Advice\n\n## Your Nutrition\nLess sodium.\nMore water.";
        let sections = split_advice_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "## Nutrition Advice");
        assert_eq!(sections[0].content, "Less sodium.\nMore water.");
    }

    #[test]
    fn test_split_keeps_subheadings_after_first_line() {
        let text = "## Body Measurements Advice\n## Summary\nDown 2 lbs.\n### Detail\nGood.";
        let sections = split_advice_sections(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "Down 2 lbs.\n### Detail\nGood.");
    }

    #[test]
    fn test_split_strips_heading_spanning_line_break() {
        let sections = split_advice_sections("## Nutrition Advice\n##\nFoo\nBar");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "Bar");
        assert_eq!(strip_heading_line("##\n\n  Foo\nBar\nBaz"), "Bar\nBaz");
    }

    #[test]
    fn test_strip_heading_line_leaves_plain_text() {
        assert_eq!(strip_heading_line("Eat.\n## Later"), "Eat.\n## Later");
        assert_eq!(strip_heading_line("##nospace\nx"), "##nospace\nx");
        assert_eq!(strip_heading_line("## Only heading"), "");
    }

    #[test]
    fn test_find_section_by_key() {
        let sections = split_advice_sections(ADVICE);
        assert_eq!(find_section(&sections, "weight").unwrap().content, "Weigh in weekly.");
        assert_eq!(find_section(&sections, "activity").unwrap().content, "Walk after dinner.");
        assert!(find_section(&sections, "sleep").is_none());

        let partial = split_advice_sections("## Nutrition Advice\nEat.");
        assert!(find_section(&partial, "activity").is_none());
    }

    fn day(date: &str) -> Row {
        Row::new().with("Date", date).with("Weight", "180")
    }

    #[test]
    fn test_advice_prompt_windows_each_dataset() {
        let measurement: Vec<Row> = (1..=20).map(|d| day(&format!("2024-01-{d:02}"))).collect();
        let prompt = advice_prompt(&[], &measurement, &[]).unwrap();
        assert!(prompt.contains("## Nutrition Advice, ## Body Measurements Advice, ## Exercise Activity Advice"));
        assert!(prompt.contains("Measurement Data:\nDate,Weight\n2024-01-07,180\n"));
        assert!(prompt.contains("2024-01-20,180"));
        assert!(!prompt.contains("2024-01-06"));
        assert!(prompt.contains("Nutrition Data:\n\n"));
    }

    #[test]
    fn test_advice_prompt_aggregates_long_exercise_logs() {
        let exercise: Vec<Row> = (0..42)
            .map(|i| {
                Row::new()
                    .with("Date", format!("2024-02-{:02}", i % 3 + 1))
                    .with("Steps", "100")
            })
            .collect();
        let prompt = advice_prompt(&[], &[], &exercise).unwrap();
        assert!(prompt.contains("Date,Exercise Calories,Exercise Minutes,Steps\n2024-02-01,0,0,1400"));
    }
}
