use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ToleranceConfig;
use crate::error::NormalizationError;

// ---------------------------------------------------------------------------
// Sources + logical fields
// ---------------------------------------------------------------------------

/// Which dataset a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Company,
    Portal,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Company, Source::Portal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Portal => "portal",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical invoice fields that a column mapping can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Gstin,
    InvoiceNumber,
    InvoiceDate,
    CentralTax,
    StateTax,
    IntegratedTax,
    PartyName,
    AccountingDoc,
    RecordId,
}

impl LogicalField {
    pub const ALL: [LogicalField; 9] = [
        Self::Gstin,
        Self::InvoiceNumber,
        Self::InvoiceDate,
        Self::CentralTax,
        Self::StateTax,
        Self::IntegratedTax,
        Self::PartyName,
        Self::AccountingDoc,
        Self::RecordId,
    ];

    /// Fields every source mapping must provide.
    pub const REQUIRED: [LogicalField; 5] = [
        Self::Gstin,
        Self::InvoiceNumber,
        Self::CentralTax,
        Self::StateTax,
        Self::IntegratedTax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gstin => "gstin",
            Self::InvoiceNumber => "invoice_number",
            Self::InvoiceDate => "invoice_date",
            Self::CentralTax => "central_tax",
            Self::StateTax => "state_tax",
            Self::IntegratedTax => "integrated_tax",
            Self::PartyName => "party_name",
            Self::AccountingDoc => "accounting_doc",
            Self::RecordId => "record_id",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One cell of an already-parsed input row.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    /// Numeric spreadsheet cell.
    Number(f64),
    /// Date spreadsheet cell.
    Date(NaiveDate),
}

impl RawValue {
    /// Text cell, or `Empty` for blank input.
    pub fn text(s: &str) -> Self {
        if s.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }

    /// Render as text. Whole numbers drop the trailing `.0` spreadsheets add.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A raw input row: column name -> cell.
///
/// `row_number` is the row's position in its file (the header is row 1 for
/// loaded files) and only feeds `raw_row_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: HashMap<String, RawValue>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: HashMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: RawValue) -> Self {
        self.cells.insert(column.to_string(), value);
        self
    }

    pub fn with_text(self, column: &str, value: &str) -> Self {
        self.with(column, RawValue::text(value))
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.cells.get(column)
    }
}

/// Both datasets for one run, in input order.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub company: Vec<RawRow>,
    pub portal: Vec<RawRow>,
}

impl ReconInput {
    pub fn rows(&self, source: Source) -> &[RawRow] {
        match source {
            Source::Company => &self.company,
            Source::Portal => &self.portal,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// Normalized (GSTIN, invoice number) pair used for primary grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentityKey {
    pub gstin: String,
    pub invoice_number: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.gstin, self.invoice_number)
    }
}

/// Audit note attached during normalization. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizationFlag {
    NegativeAmountClamped {
        field: LogicalField,
        original_paise: i64,
    },
}

/// Canonical invoice. Immutable once built; amounts are in paise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecord {
    pub source: Source,
    pub raw_row_id: String,
    pub gstin: String,
    pub invoice_number: String,
    pub invoice_number_raw: String,
    pub invoice_date: Option<NaiveDate>,
    pub central_tax_paise: i64,
    pub state_tax_paise: i64,
    pub integrated_tax_paise: i64,
    pub total_tax_paise: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounting_doc: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<NormalizationFlag>,
}

impl InvoiceRecord {
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            gstin: self.gstin.clone(),
            invoice_number: self.invoice_number.clone(),
        }
    }
}

/// Format paise as a two-decimal rupee string: 118000 -> "1180.00".
pub fn format_paise(paise: i64) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClass {
    Matched,
    BufferMatched,
    UnmatchedCompany,
    UnmatchedPortal,
}

impl fmt::Display for MatchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::BufferMatched => write!(f, "buffer_matched"),
            Self::UnmatchedCompany => write!(f, "unmatched_company"),
            Self::UnmatchedPortal => write!(f, "unmatched_portal"),
        }
    }
}

/// A company/portal pairing by arena index, as exchanged between matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub company: usize,
    pub portal: usize,
    pub class: MatchClass,
    /// portal total minus company total.
    pub discrepancy_paise: i64,
}

/// A materialized pair for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub class: MatchClass,
    pub key: String,
    pub company: InvoiceRecord,
    pub portal: InvoiceRecord,
    pub discrepancy_paise: i64,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassShare {
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceSummary {
    pub rows: usize,
    pub skipped: usize,
    pub records: usize,
    pub matched: ClassShare,
    pub buffer_matched: ClassShare,
    pub unmatched: ClassShare,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub company: SourceSummary,
    pub portal: SourceSummary,
    pub matched_pairs: usize,
    pub buffer_matched_pairs: usize,
    pub buffer_discrepancy_paise: i64,
    pub buffer_discrepancy_abs_paise: i64,
    pub matched_discrepancy_abs_paise: i64,
    pub flagged_records: usize,
    /// Company records matched or buffer-matched, as a percentage.
    pub match_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub tolerance: ToleranceConfig,
    pub require_same_date: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub matched: Vec<MatchedPair>,
    pub buffer_matched: Vec<MatchedPair>,
    pub unmatched_company: Vec<InvoiceRecord>,
    pub unmatched_portal: Vec<InvoiceRecord>,
    pub skipped: Vec<NormalizationError>,
}

impl ReconResult {
    /// Class assigned to the record with `raw_row_id` from `source`, if any.
    pub fn class_of(&self, source: Source, raw_row_id: &str) -> Option<MatchClass> {
        let in_pairs = |pairs: &[MatchedPair]| {
            pairs.iter().any(|p| {
                let record = match source {
                    Source::Company => &p.company,
                    Source::Portal => &p.portal,
                };
                record.raw_row_id == raw_row_id
            })
        };
        if in_pairs(&self.matched) {
            return Some(MatchClass::Matched);
        }
        if in_pairs(&self.buffer_matched) {
            return Some(MatchClass::BufferMatched);
        }
        let (unmatched, class) = match source {
            Source::Company => (&self.unmatched_company, MatchClass::UnmatchedCompany),
            Source::Portal => (&self.unmatched_portal, MatchClass::UnmatchedPortal),
        };
        unmatched
            .iter()
            .any(|r| r.raw_row_id == raw_row_id)
            .then_some(class)
    }
}
