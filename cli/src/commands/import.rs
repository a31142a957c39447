use std::path::Path;
use std::process;

use anyhow::Result;
use tabled::{Table, Tabled};

use healthlens_core::models::DatasetKind;
use healthlens_core::service::HealthService;

use super::helpers::{fmt_timestamp, print_json, print_right_aligned, print_rows_table};

pub(crate) fn cmd_import(service: &HealthService, kind: DatasetKind, path: &Path, json: bool) -> Result<()> {
    let rows = service.import_file(kind, path)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "kind": kind,
                "file": path.display().to_string(),
                "rows": rows,
            })
        );
    } else {
        println!("Imported {rows} {kind} rows from {}", path.display());
    }

    Ok(())
}

pub(crate) fn cmd_show(service: &HealthService, kind: DatasetKind, json: bool) -> Result<()> {
    let rows = service.dataset(kind)?;

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        eprintln!("No {kind} data. Use `healthlens import {kind} <file>` to load a CSV export.");
        process::exit(2);
    }

    print_rows_table(&rows);
    Ok(())
}

pub(crate) fn cmd_status(service: &HealthService, json: bool) -> Result<()> {
    let stored = service.list_datasets()?;

    if json {
        return print_json(&stored);
    }

    #[derive(Tabled)]
    struct DatasetRow {
        #[tabled(rename = "Dataset")]
        kind: String,
        #[tabled(rename = "File")]
        file: String,
        #[tabled(rename = "Updated")]
        updated: String,
        #[tabled(rename = "Rows")]
        rows: usize,
    }

    let rows: Vec<DatasetRow> = DatasetKind::ALL
        .iter()
        .map(|kind| match stored.iter().find(|s| s.kind == *kind) {
            Some(s) => DatasetRow {
                kind: kind.to_string(),
                file: s.file_name.clone().unwrap_or_default(),
                updated: fmt_timestamp(&s.updated_at),
                rows: s.rows,
            },
            None => DatasetRow {
                kind: kind.to_string(),
                file: "-".to_string(),
                updated: "-".to_string(),
                rows: 0,
            },
        })
        .collect();

    print_right_aligned(Table::new(&rows), 3);
    Ok(())
}

pub(crate) fn cmd_reset(service: &HealthService, kind: Option<DatasetKind>, json: bool) -> Result<()> {
    service.reset(kind)?;

    let what = kind.map_or_else(|| "all data and cached advice".to_string(), |k| format!("{k} data"));
    if json {
        println!("{}", serde_json::json!({ "reset": kind.map_or("all", DatasetKind::as_str) }));
    } else {
        println!("Cleared {what}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reset_is_an_error_in_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("healthlens.db");
        let service = HealthService::new(&path).unwrap();
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE datasets")
            .unwrap();

        // main turns an Err into exit status 1
        assert!(cmd_reset(&service, None, true).is_err());
        assert!(cmd_reset(&service, Some(DatasetKind::Exercise), false).is_err());
    }

    #[test]
    fn test_reset_succeeds_on_empty_store() {
        let service = HealthService::new_in_memory().unwrap();
        assert!(cmd_reset(&service, None, true).is_ok());
    }
}
