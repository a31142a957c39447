use std::io::{Read, Write};

use anyhow::{Context, Result, bail};

use crate::models::{DATE_COLUMN, Dataset, Row};

/// Parse a CSV export into rows keyed by the header.
///
/// Short records keep only the cells they have; cells past the header are
/// dropped. A header spelled `date` in any case is stored as `Date`. Rows with
/// every cell blank are skipped. The file is rejected when no row carries a
/// date, since nothing downstream can use it.
pub fn parse_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| {
            if h.eq_ignore_ascii_case(DATE_COLUMN) {
                DATE_COLUMN.to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.iter().all(String::is_empty) {
        bail!("CSV file has no header row");
    }

    let mut rows = Vec::new();
    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }

    if !rows.iter().any(|r| r.date().is_some()) {
        bail!("No rows with a '{DATE_COLUMN}' value found. Is this the right export?");
    }

    Ok(rows)
}

/// Write rows as CSV using the first row's columns as the header.
///
/// Cells a row lacks are written empty. Nothing is written for no rows.
pub fn write_csv<W: Write>(rows: &[Row], writer: W) -> Result<()> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let headers: Vec<&str> = first.columns().collect();

    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(&headers)?;
    for row in rows {
        wtr.write_record(headers.iter().map(|h| row.get(h).unwrap_or("")))?;
    }
    wtr.flush().context("Failed to write CSV")?;
    Ok(())
}

/// Rows as a CSV text block without a trailing newline.
pub fn csv_text(rows: &[Row]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    let mut text = String::from_utf8(buf).context("CSV output is not valid UTF-8")?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}
