use std::fmt;

use serde::Serialize;

use crate::config::ToleranceMode;
use crate::model::{LogicalField, MatchClass, Source};

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error not covered by a more specific variant.
    ConfigValidation(String),
    /// A source mapping lacks a required logical field.
    MissingMapping { source: Source, field: LogicalField },
    /// A source mapping names a logical field that does not exist.
    UnknownField { source: Source, field: String },
    /// Tolerance value out of range for its mode.
    InvalidTolerance { mode: ToleranceMode, value: f64, reason: &'static str },
    /// Date pattern chrono cannot interpret.
    InvalidDateFormat { format: String },
    /// Mapped column absent from the input header.
    MissingColumn { source: Source, column: String },
    /// Result could not be serialized.
    Serialize(String),
    /// IO error (file read, etc.).
    Io(String),
    /// Internal invariant violation in the classification sets.
    Aggregation(AggregationFault),
}

impl ReconError {
    /// True for errors that stop a run before any matching starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::MissingMapping { .. }
                | Self::UnknownField { .. }
                | Self::InvalidTolerance { .. }
                | Self::InvalidDateFormat { .. }
        )
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingMapping { source, field } => {
                write!(f, "column_mappings.{source}: missing required field '{field}'")
            }
            Self::UnknownField { source, field } => {
                write!(f, "column_mappings.{source}: unknown logical field '{field}'")
            }
            Self::InvalidTolerance { mode, value, reason } => {
                write!(f, "tolerance: {mode} value {value} is invalid ({reason})")
            }
            Self::InvalidDateFormat { format } => {
                write!(f, "date_formats: cannot interpret pattern '{format}'")
            }
            Self::MissingColumn { source, column } => {
                write!(f, "{source} input: missing column '{column}'")
            }
            Self::Serialize(msg) => write!(f, "serialization error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Aggregation(fault) => write!(f, "internal aggregation fault: {fault}"),
        }
    }
}

impl std::error::Error for ReconError {}

/// How the classification sets broke the one-record-one-class rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationFault {
    AssignedTwice {
        source: Source,
        raw_row_id: String,
        first: MatchClass,
        second: MatchClass,
    },
    Unassigned {
        source: Source,
        raw_row_id: String,
    },
    UnknownIndex {
        source: Source,
        index: usize,
    },
}

impl fmt::Display for AggregationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssignedTwice { source, raw_row_id, first, second } => write!(
                f,
                "{source} record '{raw_row_id}' classified as both {first} and {second}"
            ),
            Self::Unassigned { source, raw_row_id } => {
                write!(f, "{source} record '{raw_row_id}' is missing from every result set")
            }
            Self::UnknownIndex { source, index } => {
                write!(f, "{source} record index {index} does not exist")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-row normalization failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationIssue {
    Missing,
    NotANumber,
}

/// A row that could not become an `InvoiceRecord`. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationError {
    pub source: Source,
    pub row_id: String,
    pub field: LogicalField,
    pub value: String,
    pub issue: NormalizationIssue,
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issue {
            NormalizationIssue::Missing => {
                write!(f, "{} row '{}': {} is missing", self.source, self.row_id, self.field)
            }
            NormalizationIssue::NotANumber => write!(
                f,
                "{} row '{}': {} value '{}' is not a number",
                self.source, self.row_id, self.field, self.value
            ),
        }
    }
}

impl std::error::Error for NormalizationError {}
