use anyhow::Result;
use tabled::{Table, Tabled};

use healthlens_core::service::HealthService;

use super::helpers::{print_json, print_right_aligned};

pub(crate) fn cmd_report(service: &HealthService, json: bool) -> Result<()> {
    let report = service.report()?;

    if json {
        return print_json(&report);
    }

    #[derive(Tabled)]
    struct CardRow {
        #[tabled(rename = "Summary")]
        title: &'static str,
        #[tabled(rename = "")]
        value: String,
    }

    let rows: Vec<CardRow> = report
        .cards()
        .into_iter()
        .map(|(title, value)| CardRow { title, value })
        .collect();
    print_right_aligned(Table::new(&rows), 1);

    Ok(())
}
