//! Result export: JSON document, one CSV per result set, XLSX workbook.

use std::path::Path;

use gstmatch_recon::model::{
    format_paise, InvoiceRecord, MatchClass, MatchedPair, NormalizationFlag, ReconSummary,
};
use gstmatch_recon::ReconResult;
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::CliError;

// ── Tables ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Paise(i64),
    Count(usize),
    Percent(f64),
}

impl Cell {
    fn opt(value: &Option<String>) -> Self {
        Cell::Text(value.clone().unwrap_or_default())
    }

    fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Paise(p) => format_paise(*p),
            Cell::Count(n) => n.to_string(),
            Cell::Percent(p) => format!("{p:.2}"),
        }
    }
}

/// One result set laid out for CSV and worksheet output alike.
struct Table {
    sheet: &'static str,
    file: &'static str,
    headers: &'static [&'static str],
    rows: Vec<Vec<Cell>>,
}

const PAIR_HEADERS: &[&str] = &[
    "GSTIN",
    "Party Name",
    "Accounting Document No",
    "Invoice No",
    "Invoice Date",
    "Firm Total",
    "Portal Total",
    "Difference",
    "Match Status",
    "Portal Match",
];

const RECORD_HEADERS: &[&str] = &[
    "Row",
    "GSTIN",
    "Party Name",
    "Accounting Document No",
    "Invoice No",
    "Invoice Date",
    "Central Tax",
    "State Tax",
    "Integrated Tax",
    "Total Tax",
    "Flags",
];

const SKIPPED_HEADERS: &[&str] = &["Source", "Row", "Field", "Value", "Issue"];

fn date_cell(record: &InvoiceRecord) -> Cell {
    Cell::Text(
        record
            .invoice_date
            .map(|d| d.format("%d-%m-%Y").to_string())
            .unwrap_or_default(),
    )
}

fn pair_row(pair: &MatchedPair) -> Vec<Cell> {
    let status = match pair.class {
        MatchClass::Matched => "Exact",
        _ => "Buffer",
    };
    vec![
        Cell::Text(pair.company.gstin.clone()),
        Cell::opt(&pair.company.party_name),
        Cell::opt(&pair.company.accounting_doc),
        Cell::Text(pair.company.invoice_number_raw.clone()),
        date_cell(&pair.company),
        Cell::Paise(pair.company.total_tax_paise),
        Cell::Paise(pair.portal.total_tax_paise),
        Cell::Paise(pair.discrepancy_paise),
        Cell::Text(status.to_string()),
        Cell::Text(pair.portal.invoice_number_raw.clone()),
    ]
}

fn record_row(record: &InvoiceRecord) -> Vec<Cell> {
    let flags = record
        .flags
        .iter()
        .map(|f| match f {
            NormalizationFlag::NegativeAmountClamped { field, original_paise } => {
                format!("{field} clamped from {}", format_paise(*original_paise))
            }
        })
        .collect::<Vec<_>>()
        .join("; ");
    vec![
        Cell::Text(record.raw_row_id.clone()),
        Cell::Text(record.gstin.clone()),
        Cell::opt(&record.party_name),
        Cell::opt(&record.accounting_doc),
        Cell::Text(record.invoice_number_raw.clone()),
        date_cell(record),
        Cell::Paise(record.central_tax_paise),
        Cell::Paise(record.state_tax_paise),
        Cell::Paise(record.integrated_tax_paise),
        Cell::Paise(record.total_tax_paise),
        Cell::Text(flags),
    ]
}

fn tables(result: &ReconResult) -> Vec<Table> {
    vec![
        Table {
            sheet: "Matched",
            file: "matched.csv",
            headers: PAIR_HEADERS,
            rows: result.matched.iter().map(pair_row).collect(),
        },
        Table {
            sheet: "Buffer Matched",
            file: "buffer_matched.csv",
            headers: PAIR_HEADERS,
            rows: result.buffer_matched.iter().map(pair_row).collect(),
        },
        Table {
            sheet: "Unmatched Company",
            file: "unmatched_company.csv",
            headers: RECORD_HEADERS,
            rows: result.unmatched_company.iter().map(record_row).collect(),
        },
        Table {
            sheet: "Unmatched Portal",
            file: "unmatched_portal.csv",
            headers: RECORD_HEADERS,
            rows: result.unmatched_portal.iter().map(record_row).collect(),
        },
        Table {
            sheet: "Skipped",
            file: "skipped.csv",
            headers: SKIPPED_HEADERS,
            rows: result
                .skipped
                .iter()
                .map(|s| {
                    vec![
                        Cell::Text(s.source.to_string()),
                        Cell::Text(s.row_id.clone()),
                        Cell::Text(s.field.to_string()),
                        Cell::Text(s.value.clone()),
                        Cell::Text(s.to_string()),
                    ]
                })
                .collect(),
        },
    ]
}

fn summary_rows(summary: &ReconSummary) -> Vec<(String, Cell)> {
    let mut rows = Vec::new();
    for (label, s) in [("Company", &summary.company), ("Portal", &summary.portal)] {
        rows.push((format!("{label} rows"), Cell::Count(s.rows)));
        rows.push((format!("{label} rows skipped"), Cell::Count(s.skipped)));
        rows.push((format!("{label} records"), Cell::Count(s.records)));
        rows.push((format!("{label} matched %"), Cell::Percent(s.matched.percent)));
        rows.push((format!("{label} buffer matched %"), Cell::Percent(s.buffer_matched.percent)));
        rows.push((format!("{label} unmatched"), Cell::Count(s.unmatched.count)));
        rows.push((format!("{label} unmatched %"), Cell::Percent(s.unmatched.percent)));
    }
    rows.push(("Matched pairs".into(), Cell::Count(summary.matched_pairs)));
    rows.push(("Buffer matched pairs".into(), Cell::Count(summary.buffer_matched_pairs)));
    rows.push(("Buffer difference".into(), Cell::Paise(summary.buffer_discrepancy_paise)));
    rows.push(("Buffer difference (absolute)".into(), Cell::Paise(summary.buffer_discrepancy_abs_paise)));
    rows.push(("Flagged records".into(), Cell::Count(summary.flagged_records)));
    rows.push(("Match rate %".into(), Cell::Percent(summary.match_rate)));
    rows
}

// ── JSON ────────────────────────────────────────────────────────────

pub fn to_json(result: &ReconResult) -> Result<String, CliError> {
    serde_json::to_string_pretty(result)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))
}

pub fn write_json(result: &ReconResult, path: &Path) -> Result<(), CliError> {
    let json = to_json(result)?;
    std::fs::write(path, json)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), "wrote JSON result");
    Ok(())
}

// ── CSV ─────────────────────────────────────────────────────────────

pub fn write_csv_dir(result: &ReconResult, dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CliError::io(format!("cannot create {}: {e}", dir.display())))?;

    for table in tables(result) {
        let path = dir.join(table.file);
        let io_err = |e: csv::Error| CliError::io(format!("cannot write {}: {e}", path.display()));

        let mut writer = csv::Writer::from_path(&path).map_err(io_err)?;
        writer.write_record(table.headers).map_err(io_err)?;
        for row in &table.rows {
            writer
                .write_record(row.iter().map(Cell::render))
                .map_err(io_err)?;
        }
        writer
            .flush()
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    }

    info!(dir = %dir.display(), "wrote CSV files");
    Ok(())
}

// ── XLSX ────────────────────────────────────────────────────────────

pub fn write_workbook(result: &ReconResult, path: &Path) -> Result<(), CliError> {
    build_workbook(result)
        .and_then(|mut workbook| workbook.save(path))
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), "wrote workbook");
    Ok(())
}

fn build_workbook(result: &ReconResult) -> Result<Workbook, rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");
    let percent = Format::new().set_num_format("0.00");

    for table in tables(result) {
        let sheet = workbook.add_worksheet().set_name(table.sheet)?;
        for (c, header) in table.headers.iter().enumerate() {
            sheet.write_string_with_format(0, c as u16, *header, &bold)?;
            sheet.set_column_width(c as u16, (header.len() + 4).max(12) as f64)?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            let r = r as u32 + 1;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Text(s) => sheet.write_string(r, c, s)?,
                    Cell::Paise(p) => sheet.write_number_with_format(r, c, *p as f64 / 100.0, &money)?,
                    Cell::Count(n) => sheet.write_number(r, c, *n as f64)?,
                    Cell::Percent(p) => sheet.write_number_with_format(r, c, *p, &percent)?,
                };
            }
        }
        sheet.set_freeze_panes(1, 0)?;
    }

    let sheet = workbook.add_worksheet().set_name("Summary")?;
    sheet.write_string_with_format(0, 0, "Metric", &bold)?;
    sheet.write_string_with_format(0, 1, "Value", &bold)?;
    sheet.set_column_width(0, 32)?;
    sheet.set_column_width(1, 16)?;
    sheet.write_string(1, 0, "Configuration")?;
    sheet.write_string(1, 1, &result.meta.config_name)?;
    for (i, (label, cell)) in summary_rows(&result.summary).iter().enumerate() {
        let r = i as u32 + 2;
        sheet.write_string(r, 0, label)?;
        match cell {
            Cell::Paise(p) => sheet.write_number_with_format(r, 1, *p as f64 / 100.0, &money)?,
            Cell::Count(n) => sheet.write_number(r, 1, *n as f64)?,
            Cell::Percent(p) => sheet.write_number_with_format(r, 1, *p, &percent)?,
            Cell::Text(s) => sheet.write_string(r, 1, s)?,
        };
    }

    Ok(workbook)
}
