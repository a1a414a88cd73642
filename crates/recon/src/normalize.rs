use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::config::{ReconConfig, SourceColumns};
use crate::error::{NormalizationError, NormalizationIssue, ReconError};
use crate::model::{InvoiceRecord, LogicalField, NormalizationFlag, RawRow, RawValue, Source};

/// Currency markers removed before parsing an amount. Longest first.
const CURRENCY_MARKERS: [&str; 4] = ["INR", "RS.", "RS", "₹"];

/// Normalized records of one source plus the rows that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSource {
    pub rows: usize,
    pub records: Vec<InvoiceRecord>,
    pub skipped: Vec<NormalizationError>,
}

/// Turns raw rows of one source into `InvoiceRecord`s.
pub struct Normalizer<'a> {
    columns: SourceColumns,
    date_formats: &'a [String],
    strip_chars: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn new(source: Source, config: &'a ReconConfig) -> Result<Self, ReconError> {
        Ok(Self {
            columns: config.column_mappings.resolve(source)?,
            date_formats: &config.date_formats,
            strip_chars: &config.punctuation_strip_chars,
        })
    }

    pub fn source(&self) -> Source {
        self.columns.source()
    }

    pub fn normalize(&self, row: &RawRow) -> Result<InvoiceRecord, NormalizationError> {
        let raw_row_id = self.row_id(row);

        let gstin_raw = self.text(row, LogicalField::Gstin);
        let gstin = normalize_identifier(&gstin_raw, self.strip_chars);
        if gstin.is_empty() {
            return Err(self.error(&raw_row_id, LogicalField::Gstin, gstin_raw, NormalizationIssue::Missing));
        }

        let invoice_raw = self.text(row, LogicalField::InvoiceNumber);
        let invoice_number = normalize_identifier(&invoice_raw, self.strip_chars);
        if invoice_number.is_empty() {
            return Err(self.error(
                &raw_row_id,
                LogicalField::InvoiceNumber,
                invoice_raw,
                NormalizationIssue::Missing,
            ));
        }

        let invoice_date = self
            .cell(row, LogicalField::InvoiceDate)
            .and_then(|value| parse_date(value, self.date_formats));

        let mut flags = Vec::new();
        let central_tax_paise = self.amount(row, &raw_row_id, LogicalField::CentralTax, &mut flags)?;
        let state_tax_paise = self.amount(row, &raw_row_id, LogicalField::StateTax, &mut flags)?;
        let integrated_tax_paise =
            self.amount(row, &raw_row_id, LogicalField::IntegratedTax, &mut flags)?;

        Ok(InvoiceRecord {
            source: self.source(),
            raw_row_id,
            gstin,
            invoice_number,
            invoice_number_raw: invoice_raw.trim().to_string(),
            invoice_date,
            central_tax_paise,
            state_tax_paise,
            integrated_tax_paise,
            total_tax_paise: central_tax_paise
                .saturating_add(state_tax_paise)
                .saturating_add(integrated_tax_paise),
            party_name: self.optional_text(row, LogicalField::PartyName),
            accounting_doc: self.optional_text(row, LogicalField::AccountingDoc),
            flags,
        })
    }

    fn cell<'r>(&self, row: &'r RawRow, field: LogicalField) -> Option<&'r RawValue> {
        self.columns.get(field).and_then(|column| row.get(column))
    }

    fn text(&self, row: &RawRow, field: LogicalField) -> String {
        self.cell(row, field).map(RawValue::to_text).unwrap_or_default()
    }

    fn optional_text(&self, row: &RawRow, field: LogicalField) -> Option<String> {
        let text = self.text(row, field);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn row_id(&self, row: &RawRow) -> String {
        self.optional_text(row, LogicalField::RecordId)
            .unwrap_or_else(|| format!("{}#{}", self.source(), row.row_number))
    }

    fn amount(
        &self,
        row: &RawRow,
        raw_row_id: &str,
        field: LogicalField,
        flags: &mut Vec<NormalizationFlag>,
    ) -> Result<i64, NormalizationError> {
        let value = self.cell(row, field);
        let parsed = match value {
            None | Some(RawValue::Empty) => Some(0),
            Some(RawValue::Text(s)) => parse_paise(s),
            Some(RawValue::Number(n)) => number_to_paise(*n),
            Some(RawValue::Date(_)) => None,
        };

        let paise = parsed.ok_or_else(|| {
            self.error(
                raw_row_id,
                field,
                value.map(RawValue::to_text).unwrap_or_default(),
                NormalizationIssue::NotANumber,
            )
        })?;

        if paise < 0 {
            warn!(
                source = %self.source(),
                row = raw_row_id,
                field = %field,
                paise,
                "negative tax amount clamped to zero"
            );
            flags.push(NormalizationFlag::NegativeAmountClamped {
                field,
                original_paise: paise,
            });
            return Ok(0);
        }
        Ok(paise)
    }

    fn error(
        &self,
        raw_row_id: &str,
        field: LogicalField,
        value: String,
        issue: NormalizationIssue,
    ) -> NormalizationError {
        NormalizationError {
            source: self.source(),
            row_id: raw_row_id.to_string(),
            field,
            value,
            issue,
        }
    }
}

/// Normalize every row of one source, keeping input order.
pub fn normalize_rows(
    source: Source,
    rows: &[RawRow],
    config: &ReconConfig,
) -> Result<NormalizedSource, ReconError> {
    let normalizer = Normalizer::new(source, config)?;
    let mut out = NormalizedSource {
        rows: rows.len(),
        ..Default::default()
    };

    for row in rows {
        match normalizer.normalize(row) {
            Ok(record) => out.records.push(record),
            Err(err) => {
                warn!(%err, "row skipped");
                out.skipped.push(err);
            }
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

/// Trim, drop `strip_chars`, uppercase.
pub fn normalize_identifier(raw: &str, strip_chars: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !strip_chars.contains(*c))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Parse a rupee amount string into paise.
///
/// Accepts `₹`/`Rs`/`INR` markers, `,` separators (lakh grouping included),
/// a leading sign and `(123.45)` negatives. A third decimal rounds half-up.
/// Blank input is zero; anything else unparseable is `None`.
pub fn parse_paise(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0);
    }

    let (paren_negative, inner) =
        if trimmed.len() >= 2 && trimmed.starts_with('(') && trimmed.ends_with(')') {
            (true, &trimmed[1..trimmed.len() - 1])
        } else {
            (false, trimmed)
        };

    let upper = inner.trim().to_uppercase();
    let (outer_sign, unsigned) = split_sign(&upper);
    let mut cleaned = strip_currency(unsigned).to_string();
    cleaned.retain(|c| c != ',' && !c.is_whitespace());

    // A sign may sit before or after a leading marker, not both
    let (inner_sign, digits) = split_sign(&cleaned);
    if outer_sign.is_some() && inner_sign.is_some() {
        return None;
    }
    let sign_negative = outer_sign.or(inner_sign) == Some('-');

    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let rupees: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
    let tens = frac_digits.next().unwrap_or(0);
    let units = frac_digits.next().unwrap_or(0);
    let round_up = i64::from(frac_digits.next().unwrap_or(0) >= 5);

    let paise = rupees.checked_mul(100)?.checked_add(tens * 10 + units + round_up)?;
    Some(if paren_negative || sign_negative { -paise } else { paise })
}

fn split_sign(s: &str) -> (Option<char>, &str) {
    match s.chars().next() {
        Some(c @ ('-' | '+')) => (Some(c), &s[1..]),
        _ => (None, s),
    }
}

/// Currency markers only count at either end of the amount.
fn strip_currency(s: &str) -> &str {
    let mut rest = s.trim();
    loop {
        let before = rest;
        for marker in CURRENCY_MARKERS {
            if let Some(r) = rest.strip_prefix(marker) {
                rest = r.trim_start();
            }
            if let Some(r) = rest.strip_suffix(marker) {
                rest = r.trim_end();
            }
        }
        if rest == before {
            return rest;
        }
    }
}

/// Spreadsheet numeric cell to paise, rounding half away from zero.
pub fn number_to_paise(n: f64) -> Option<i64> {
    if !n.is_finite() || n.abs() >= (i64::MAX / 100) as f64 {
        return None;
    }
    Some((n * 100.0).round() as i64)
}

/// First configured pattern that parses the value wins. Unparseable is `None`.
pub fn parse_date(value: &RawValue, formats: &[String]) -> Option<NaiveDate> {
    let text = match value {
        RawValue::Date(date) => return Some(*date),
        RawValue::Empty => return None,
        RawValue::Text(_) | RawValue::Number(_) => value.to_text(),
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parse_with = |candidate: &str, format: &str| {
        NaiveDate::parse_from_str(candidate, format)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(candidate, format).ok().map(|dt| dt.date()))
    };

    formats
        .iter()
        .find_map(|format| parse_with(text, format))
        .or_else(|| {
            // "15-01-2024 00:00:00" / "2024-01-15T00:00:00" exports
            let date_part = text.split([' ', 'T']).next()?;
            if date_part == text {
                return None;
            }
            formats.iter().find_map(|format| parse_with(date_part, format))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconConfig {
        ReconConfig::default()
    }

    fn company_row(gstin: &str, invoice: &str, cgst: &str) -> RawRow {
        RawRow::new(2)
            .with_text("GSTIN of supplier", gstin)
            .with_text("Invoice No", invoice)
            .with_text("Invoice Date", "15-01-2024")
            .with_text("CGST Amount", cgst)
            .with_text("SGST Amount", "90.00")
            .with_text("IGST Amount", "")
            .with_text("Party Name", "  Acme Traders ")
    }

    #[test]
    fn identifiers_converge_across_sources() {
        let strip = "-/._ ";
        assert_eq!(normalize_identifier(" 29abcde1234f1z5 ", strip), "29ABCDE1234F1Z5");
        assert_eq!(normalize_identifier("INV-001", strip), "INV001");
        assert_eq!(normalize_identifier("inv001", strip), "INV001");
        assert_eq!(normalize_identifier("inv/24-25/001", strip), "INV2425001");
        assert_eq!(normalize_identifier("INV-001", ""), "INV-001");
    }

    #[test]
    fn amounts_parse_to_paise() {
        assert_eq!(parse_paise("1180"), Some(118000));
        assert_eq!(parse_paise("1,180.5"), Some(118050));
        assert_eq!(parse_paise("₹ 1,18,000.00"), Some(11800000));
        assert_eq!(parse_paise("Rs. 90.25"), Some(9025));
        assert_eq!(parse_paise("90.25 INR"), Some(9025));
        assert_eq!(parse_paise("(45.10)"), Some(-4510));
        assert_eq!(parse_paise("-0.5"), Some(-50));
        assert_eq!(parse_paise(".75"), Some(75));
        assert_eq!(parse_paise("10.005"), Some(1001));
        assert_eq!(parse_paise("10.004"), Some(1000));
        assert_eq!(parse_paise(""), Some(0));
        assert_eq!(parse_paise("abc"), None);
        assert_eq!(parse_paise("12.3.4"), None);
        assert_eq!(parse_paise("."), None);
    }

    #[test]
    fn currency_markers_only_at_the_ends() {
        assert_eq!(parse_paise("-₹500"), Some(-50000));
        assert_eq!(parse_paise("Rs -12.50"), Some(-1250));
        assert_eq!(parse_paise("INR 1,250 ₹"), Some(125000));
        assert_eq!(parse_paise("12RS34"), None);
        assert_eq!(parse_paise("1₹00"), None);
        assert_eq!(parse_paise("5 INR 0"), None);
        assert_eq!(parse_paise("-₹-500"), None);
    }

    #[test]
    fn numeric_cells_round_to_paise() {
        assert_eq!(number_to_paise(1180.0), Some(118000));
        assert_eq!(number_to_paise(0.1 + 0.2), Some(30));
        assert_eq!(number_to_paise(f64::NAN), None);
    }

    #[test]
    fn dates_try_formats_in_order() {
        let formats = vec!["%d-%m-%Y".to_string(), "%d/%m/%Y".to_string()];
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date(&RawValue::text("15-01-2024"), &formats), expected);
        assert_eq!(parse_date(&RawValue::text("15/01/2024"), &formats), expected);
        assert_eq!(parse_date(&RawValue::text("15-01-2024 00:00:00"), &formats), expected);
        assert_eq!(parse_date(&RawValue::text("2024-01-15"), &formats), None);
        assert_eq!(parse_date(&RawValue::text("soon"), &formats), None);
        assert_eq!(parse_date(&RawValue::Empty, &formats), None);
        let cell = RawValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(parse_date(&cell, &formats), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn normalize_full_row() {
        let config = config();
        let normalizer = Normalizer::new(Source::Company, &config).unwrap();
        let record = normalizer
            .normalize(&company_row("29abcde1234f1z5", "INV-001", "1,090.00"))
            .unwrap();

        assert_eq!(record.source, Source::Company);
        assert_eq!(record.raw_row_id, "company#2");
        assert_eq!(record.key().to_string(), "29ABCDE1234F1Z5|INV001");
        assert_eq!(record.invoice_number_raw, "INV-001");
        assert_eq!(record.invoice_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(record.central_tax_paise, 109000);
        assert_eq!(record.state_tax_paise, 9000);
        assert_eq!(record.integrated_tax_paise, 0);
        assert_eq!(record.total_tax_paise, 118000);
        assert_eq!(record.party_name.as_deref(), Some("Acme Traders"));
        assert_eq!(record.accounting_doc, None);
        assert!(record.flags.is_empty());
    }

    #[test]
    fn negative_amount_clamped_and_flagged() {
        let config = config();
        let normalizer = Normalizer::new(Source::Company, &config).unwrap();
        let record = normalizer
            .normalize(&company_row("29ABCDE1234F1Z5", "INV-9", "-25.00"))
            .unwrap();
        assert_eq!(record.central_tax_paise, 0);
        assert_eq!(record.total_tax_paise, 9000);
        assert_eq!(
            record.flags,
            vec![NormalizationFlag::NegativeAmountClamped {
                field: LogicalField::CentralTax,
                original_paise: -2500,
            }]
        );
    }

    #[test]
    fn unparseable_date_is_kept_as_none() {
        let config = config();
        let normalizer = Normalizer::new(Source::Company, &config).unwrap();
        let row = company_row("29ABCDE1234F1Z5", "INV-1", "10").with_text("Invoice Date", "31st Jan");
        let record = normalizer.normalize(&row).unwrap();
        assert_eq!(record.invoice_date, None);
    }

    #[test]
    fn missing_identity_is_a_row_error() {
        let config = config();
        let normalizer = Normalizer::new(Source::Company, &config).unwrap();
        let err = normalizer.normalize(&company_row("29ABCDE1234F1Z5", " - ", "10")).unwrap_err();
        assert_eq!(err.field, LogicalField::InvoiceNumber);
        assert_eq!(err.issue, NormalizationIssue::Missing);
        assert_eq!(err.to_string(), "company row 'company#2': invoice_number is missing");
    }

    #[test]
    fn garbage_amount_is_a_row_error() {
        let config = config();
        let normalizer = Normalizer::new(Source::Company, &config).unwrap();
        let err = normalizer.normalize(&company_row("29ABCDE1234F1Z5", "INV-1", "n/a")).unwrap_err();
        assert_eq!(err.field, LogicalField::CentralTax);
        assert_eq!(err.issue, NormalizationIssue::NotANumber);
        assert_eq!(err.value, "n/a");
    }

    #[test]
    fn record_id_column_overrides_row_number() {
        let mut config = config();
        config
            .column_mappings
            .company
            .insert("record_id".into(), "Accounting Document No".into());
        let normalizer = Normalizer::new(Source::Company, &config).unwrap();
        let row = company_row("29ABCDE1234F1Z5", "INV-1", "10").with_text("Accounting Document No", "AD-77");
        assert_eq!(normalizer.normalize(&row).unwrap().raw_row_id, "AD-77");
    }

    #[test]
    fn normalize_rows_counts_skips() {
        let config = config();
        let rows = vec![
            company_row("29ABCDE1234F1Z5", "INV-1", "10"),
            company_row("", "INV-2", "10"),
            company_row("29ABCDE1234F1Z5", "INV-3", "10"),
        ];
        let out = normalize_rows(Source::Company, &rows, &config).unwrap();
        assert_eq!(out.rows, 3);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].field, LogicalField::Gstin);
    }
}
