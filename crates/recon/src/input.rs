use crate::config::SourceColumns;
use crate::error::ReconError;
use crate::model::{RawRow, RawValue};

/// Every mapped column must be present in the header.
pub fn check_headers(headers: &[String], columns: &SourceColumns) -> Result<(), ReconError> {
    for (_, column) in columns.iter() {
        if !headers.iter().any(|h| h == column) {
            return Err(ReconError::MissingColumn {
                source: columns.source(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Load CSV rows into `RawRow`s. `row_number` is the file line a record
/// starts on, so the header is row 1 and skipped blank lines still count.
pub fn load_csv_rows(csv_data: &str, columns: &SourceColumns) -> Result<Vec<RawRow>, ReconError> {
    let csv_data = csv_data.strip_prefix('\u{feff}').unwrap_or(csv_data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    check_headers(&headers, columns)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let line = record.position().map_or(i + 2, |p| p.line() as usize);
        let mut row = RawRow::new(line);
        for (h, header) in headers.iter().enumerate() {
            let value = record.get(h).map(RawValue::text).unwrap_or(RawValue::Empty);
            row.cells.insert(header.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}
