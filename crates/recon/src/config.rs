use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{LogicalField, Source};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Tried in order; the first pattern that parses the whole value wins.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    /// Characters removed from GSTINs and invoice numbers.
    #[serde(default = "default_strip_chars")]
    pub punctuation_strip_chars: String,
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub column_mappings: ColumnMappings,
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "GST reconciliation".into()
}

fn default_date_formats() -> Vec<String> {
    vec!["%d-%m-%Y".into(), "%d/%m/%Y".into(), "%Y-%m-%d".into()]
}

fn default_strip_chars() -> String {
    "-/._ ".into()
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Logical field name -> source column header, per source.
///
/// A source whose table is absent gets the default headers: a typical ledger
/// export for the company, the GSTR-2B download for the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMappings {
    #[serde(default = "default_company_columns")]
    pub company: BTreeMap<String, String>,
    #[serde(default = "default_portal_columns")]
    pub portal: BTreeMap<String, String>,
}

impl Default for ColumnMappings {
    fn default() -> Self {
        Self {
            company: default_company_columns(),
            portal: default_portal_columns(),
        }
    }
}

fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(field, column)| (field.to_string(), column.to_string()))
        .collect()
}

fn default_company_columns() -> BTreeMap<String, String> {
    mapping(&[
        ("gstin", "GSTIN of supplier"),
        ("party_name", "Party Name"),
        ("accounting_doc", "Accounting Document No"),
        ("invoice_number", "Invoice No"),
        ("invoice_date", "Invoice Date"),
        ("central_tax", "CGST Amount"),
        ("state_tax", "SGST Amount"),
        ("integrated_tax", "IGST Amount"),
    ])
}

fn default_portal_columns() -> BTreeMap<String, String> {
    mapping(&[
        ("gstin", "GSTIN of supplier"),
        ("invoice_number", "Invoice number"),
        ("invoice_date", "Invoice Date"),
        ("central_tax", "Central Tax(₹)"),
        ("state_tax", "State/UT Tax(₹)"),
        ("integrated_tax", "Integrated Tax(₹)"),
    ])
}

impl ColumnMappings {
    pub fn for_source(&self, source: Source) -> &BTreeMap<String, String> {
        match source {
            Source::Company => &self.company,
            Source::Portal => &self.portal,
        }
    }

    /// Check one source's mapping and resolve it into typed column names.
    pub fn resolve(&self, source: Source) -> Result<SourceColumns, ReconError> {
        let mut columns: BTreeMap<LogicalField, String> = BTreeMap::new();
        for (name, column) in self.for_source(source) {
            let field = LogicalField::from_name(name).ok_or_else(|| ReconError::UnknownField {
                source,
                field: name.clone(),
            })?;
            if column.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "column_mappings.{source}.{name}: column name is empty"
                )));
            }
            columns.insert(field, column.clone());
        }

        for field in LogicalField::REQUIRED {
            if !columns.contains_key(&field) {
                return Err(ReconError::MissingMapping { source, field });
            }
        }

        Ok(SourceColumns { source, columns })
    }
}

/// A validated mapping for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumns {
    source: Source,
    columns: BTreeMap<LogicalField, String>,
}

impl SourceColumns {
    pub fn source(&self) -> Source {
        self.source
    }

    pub fn get(&self, field: LogicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    /// All mapped (field, column) entries.
    pub fn iter(&self) -> impl Iterator<Item = (LogicalField, &str)> {
        self.columns.iter().map(|(f, c)| (*f, c.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Tolerance + buffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceMode {
    /// Fixed amount in rupees.
    Absolute,
    /// Percentage of the larger of the two totals.
    Percentage,
}

impl std::fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "absolute"),
            Self::Percentage => write!(f, "percentage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    #[serde(default = "default_tolerance_mode")]
    pub mode: ToleranceMode,
    #[serde(default = "default_tolerance_value")]
    pub value: f64,
}

fn default_tolerance_mode() -> ToleranceMode {
    ToleranceMode::Absolute
}

fn default_tolerance_value() -> f64 {
    1.0
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            mode: default_tolerance_mode(),
            value: default_tolerance_value(),
        }
    }
}

impl ToleranceConfig {
    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |reason| ReconError::InvalidTolerance {
            mode: self.mode,
            value: self.value,
            reason,
        };
        if !self.value.is_finite() {
            return Err(invalid("must be a finite number"));
        }
        if self.value < 0.0 {
            return Err(invalid("must not be negative"));
        }
        if self.mode == ToleranceMode::Percentage {
            if self.value > 100.0 {
                return Err(invalid("percentage cannot exceed 100"));
            }
            // Matching works in parts per million of the larger total
            let ppm = self.value * 10_000.0;
            if (ppm - ppm.round()).abs() > 1e-6 {
                return Err(invalid("percentage resolution is 0.0001"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Refuse buffer pairs whose invoice dates are both known and differ.
    #[serde(default)]
    pub require_same_date: bool,
}

// ---------------------------------------------------------------------------
// Inputs + Output (CLI only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<InputFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal: Option<InputFile>,
}

impl InputsConfig {
    pub fn for_source(&self, source: Source) -> Option<&InputFile> {
        match source {
            Source::Company => self.company.as_ref(),
            Source::Portal => self.portal.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            date_formats: default_date_formats(),
            punctuation_strip_chars: default_strip_chars(),
            tolerance: ToleranceConfig::default(),
            buffer: BufferConfig::default(),
            column_mappings: ColumnMappings::default(),
            inputs: InputsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.date_formats.is_empty() {
            return Err(ReconError::ConfigValidation(
                "date_formats must list at least one pattern".into(),
            ));
        }
        for format in &self.date_formats {
            if format.trim().is_empty()
                || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
            {
                return Err(ReconError::InvalidDateFormat {
                    format: format.clone(),
                });
            }
        }

        if let Some(c) = self.punctuation_strip_chars.chars().find(|c| c.is_alphanumeric()) {
            return Err(ReconError::ConfigValidation(format!(
                "punctuation_strip_chars must not contain letters or digits, found '{c}'"
            )));
        }

        self.tolerance.validate()?;

        for source in Source::ALL {
            self.column_mappings.resolve(source)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
