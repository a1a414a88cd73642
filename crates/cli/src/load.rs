//! Input file loading: CSV through the engine's loader, spreadsheets via calamine.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Days, NaiveDate};
use gstmatch_recon::config::SourceColumns;
use gstmatch_recon::input::{check_headers, load_csv_rows};
use gstmatch_recon::{RawRow, RawValue};
use tracing::debug;

use crate::CliError;

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Load one source file. The format follows the file extension.
pub fn load_rows(
    path: &Path,
    sheet: Option<&str>,
    columns: &SourceColumns,
) -> Result<Vec<RawRow>, CliError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let rows = if ext == "csv" {
        if sheet.is_some() {
            return Err(CliError::args(format!(
                "{}: --{}-sheet only applies to spreadsheets",
                path.display(),
                columns.source()
            )));
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
        load_csv_rows(&data, columns).map_err(CliError::recon)?
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        load_spreadsheet_rows(path, sheet, columns)?
    } else {
        return Err(CliError::args(format!(
            "{}: unsupported input format (expected .csv, .xlsx, .xls or .ods)",
            path.display()
        )));
    };

    debug!(source = %columns.source(), path = %path.display(), rows = rows.len(), "loaded input");
    Ok(rows)
}

/// First (or named) worksheet; the first row is the header.
fn load_spreadsheet_rows(
    path: &Path,
    sheet: Option<&str>,
    columns: &SourceColumns,
) -> Result<Vec<RawRow>, CliError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| CliError::io(format!("cannot open {}: {e}", path.display())))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| {
            CliError::input(format!("{} contains no sheets", path.display()))
        })?,
    };

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        CliError::input(format!("cannot read sheet '{sheet_name}' of {}: {e}", path.display()))
    })?;

    // Data may not begin at A1
    let (start_row, _) = range.start().unwrap_or((0, 0));
    let mut rows_iter = range.rows();

    let headers: Vec<String> = match rows_iter.next() {
        Some(header) => header.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };
    check_headers(&headers, columns).map_err(CliError::recon)?;

    let mut rows = Vec::new();
    for (i, cells) in rows_iter.enumerate() {
        let values: Vec<RawValue> = cells.iter().map(cell_value).collect();
        if values.iter().all(RawValue::is_blank) {
            continue;
        }

        // Header sits on sheet row start_row + 1 (1-based)
        let mut row = RawRow::new(start_row as usize + i + 2);
        for (header, value) in headers.iter().zip(values) {
            if !header.is_empty() {
                row.cells.insert(header.clone(), value);
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::text(s),
        Data::Float(n) => RawValue::Number(*n),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Bool(b) => RawValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => RawValue::Text(format!("#{e:?}")),
        Data::DateTime(dt) => match serial_to_date(dt.as_f64()) {
            Some(date) => RawValue::Date(date),
            None => RawValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::text(s),
    }
}

/// Excel 1900-system serial to a calendar date. Time of day is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Day 0 is 1899-12-30, which absorbs Excel's phantom 1900-02-29
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}
