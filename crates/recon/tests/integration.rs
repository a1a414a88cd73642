use std::path::PathBuf;

use gstmatch_recon::config::{ReconConfig, ToleranceConfig, ToleranceMode};
use gstmatch_recon::error::NormalizationIssue;
use gstmatch_recon::model::{LogicalField, MatchClass, RawRow, ReconInput, ReconResult, Source};
use gstmatch_recon::{load_csv_rows, run, ReconError};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("gst.recon.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn load_input(config: &ReconConfig) -> ReconInput {
    let mut input = ReconInput::default();
    for source in Source::ALL {
        let file = config.inputs.for_source(source).unwrap();
        let path = fixtures_dir().join(&file.file);
        let data = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
        let columns = config.column_mappings.resolve(source).unwrap();
        let rows = load_csv_rows(&data, &columns).unwrap();
        match source {
            Source::Company => input.company = rows,
            Source::Portal => input.portal = rows,
        }
    }
    input
}

fn load_and_run(config: &ReconConfig) -> ReconResult {
    run(config, &load_input(config)).unwrap()
}

fn company_row(n: usize, invoice: &str, cgst: &str) -> RawRow {
    RawRow::new(n)
        .with_text("GSTIN of supplier", "29ABCDE1234F1Z5")
        .with_text("Invoice No", invoice)
        .with_text("CGST Amount", cgst)
        .with_text("SGST Amount", "")
        .with_text("IGST Amount", "")
}

fn portal_row(n: usize, invoice: &str, cgst: &str) -> RawRow {
    RawRow::new(n)
        .with_text("GSTIN of supplier", "29abcde1234f1z5")
        .with_text("Invoice number", invoice)
        .with_text("Central Tax(₹)", cgst)
        .with_text("State/UT Tax(₹)", "")
        .with_text("Integrated Tax(₹)", "")
}

fn absolute(rupees: f64) -> ReconConfig {
    ReconConfig {
        tolerance: ToleranceConfig {
            mode: ToleranceMode::Absolute,
            value: rupees,
        },
        ..Default::default()
    }
}

// -------------------------------------------------------------------------
// Fixture run
// -------------------------------------------------------------------------

#[test]
fn fixture_classifies_every_record() {
    let config = fixture_config();
    let result = load_and_run(&config);

    assert_eq!(result.meta.config_name, "Fixture reconciliation");
    assert_eq!(result.summary.company.rows, 6);
    assert_eq!(result.summary.company.records, 5);
    assert_eq!(result.summary.portal.records, 5);
    assert_eq!(result.summary.matched_pairs, 2);
    assert_eq!(result.summary.buffer_matched_pairs, 1);
    assert_eq!(result.unmatched_company.len(), 2);
    assert_eq!(result.unmatched_portal.len(), 2);
    assert_eq!(result.summary.match_rate, 60.0);

    // INV-001 vs inv001, different case and punctuation
    assert_eq!(result.class_of(Source::Company, "company#2"), Some(MatchClass::Matched));
    assert_eq!(result.matched[0].key, "29ABCDE1234F1Z5|INV001");
    assert_eq!(result.matched[0].company.party_name.as_deref(), Some("Acme Traders"));

    // currency marker and thousands separator
    assert_eq!(result.class_of(Source::Company, "company#4"), Some(MatchClass::Matched));
    assert_eq!(result.matched[1].company.total_tax_paise, 125000);

    let buffer = &result.buffer_matched[0];
    assert_eq!(buffer.company.raw_row_id, "company#3");
    assert_eq!(buffer.portal.raw_row_id, "portal#3");
    assert_eq!(buffer.discrepancy_paise, -500);
    assert_eq!(result.summary.buffer_discrepancy_abs_paise, 500);

    // same key, amounts too far apart
    assert_eq!(
        result.class_of(Source::Company, "company#6"),
        Some(MatchClass::UnmatchedCompany)
    );
    assert_eq!(
        result.class_of(Source::Portal, "portal#5"),
        Some(MatchClass::UnmatchedPortal)
    );
    assert_eq!(
        result.class_of(Source::Portal, "portal#6"),
        Some(MatchClass::UnmatchedPortal)
    );

    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].row_id, "company#7");
    assert_eq!(result.skipped[0].field, LogicalField::Gstin);
    assert_eq!(result.skipped[0].issue, NormalizationIssue::Missing);
}

#[test]
fn tighter_tolerance_unmatches_buffer_pair() {
    let mut config = fixture_config();
    config.tolerance.value = 4.99;
    let result = load_and_run(&config);
    assert!(result.buffer_matched.is_empty());
    assert_eq!(
        result.class_of(Source::Company, "company#3"),
        Some(MatchClass::UnmatchedCompany)
    );
    assert_eq!(
        result.class_of(Source::Portal, "portal#3"),
        Some(MatchClass::UnmatchedPortal)
    );
}

#[test]
fn percentage_tolerance() {
    let mut config = fixture_config();
    config.tolerance = ToleranceConfig {
        mode: ToleranceMode::Percentage,
        value: 25.0,
    };
    let result = load_and_run(&config);
    // 200.00 vs 250.00 is 20% of the larger amount
    assert_eq!(
        result.class_of(Source::Company, "company#6"),
        Some(MatchClass::BufferMatched)
    );
    assert_eq!(result.summary.buffer_matched_pairs, 2);
}

#[test]
fn runs_are_deterministic() {
    let config = fixture_config();
    let input = load_input(&config);
    let first = serde_json::to_string(&run(&config, &input).unwrap()).unwrap();
    let second = serde_json::to_string(&run(&config, &input).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_column_in_file() {
    let mut config = fixture_config();
    config
        .column_mappings
        .company
        .insert("invoice_date".into(), "Bill Date".into());
    let data = std::fs::read_to_string(fixtures_dir().join("company.csv")).unwrap();
    let columns = config.column_mappings.resolve(Source::Company).unwrap();
    let err = load_csv_rows(&data, &columns).unwrap_err();
    assert_eq!(err.to_string(), "company input: missing column 'Bill Date'");
}

// -------------------------------------------------------------------------
// Classification scenarios
// -------------------------------------------------------------------------

#[test]
fn normalized_keys_match_exactly() {
    let input = ReconInput {
        company: vec![company_row(2, "INV-001", "1180.00")],
        portal: vec![portal_row(2, "inv001", "1180.00")],
    };
    let result = run(&absolute(10.0), &input).unwrap();
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].key, "29ABCDE1234F1Z5|INV001");
    assert_eq!(result.matched[0].discrepancy_paise, 0);
}

#[test]
fn five_rupee_gap_is_buffer_matched() {
    let input = ReconInput {
        company: vec![company_row(2, "INV-001", "1180.00")],
        portal: vec![portal_row(2, "inv001", "1175.00")],
    };
    let result = run(&absolute(10.0), &input).unwrap();
    assert_eq!(result.buffer_matched.len(), 1);
    assert_eq!(result.buffer_matched[0].discrepancy_paise.abs(), 500);
    assert!(result.matched.is_empty());
}

#[test]
fn portal_only_key_is_unmatched_portal() {
    let input = ReconInput {
        company: Vec::new(),
        portal: vec![portal_row(2, "P-1", "10")],
    };
    let result = run(&absolute(1.0), &input).unwrap();
    assert_eq!(
        result.class_of(Source::Portal, "portal#2"),
        Some(MatchClass::UnmatchedPortal)
    );
    assert_eq!(result.summary.portal.unmatched.percent, 100.0);
}

#[test]
fn duplicate_company_keys_pair_earliest() {
    let input = ReconInput {
        company: vec![company_row(2, "INV-001", "100"), company_row(3, "INV001", "100")],
        portal: vec![portal_row(2, "INV-001", "100")],
    };
    let result = run(&absolute(1.0), &input).unwrap();
    assert_eq!(result.class_of(Source::Company, "company#2"), Some(MatchClass::Matched));
    assert_eq!(
        result.class_of(Source::Company, "company#3"),
        Some(MatchClass::UnmatchedCompany)
    );
}

#[test]
fn zero_tolerance_still_allows_one_paisa() {
    let input = ReconInput {
        company: vec![company_row(2, "A1", "100.00"), company_row(3, "A2", "100.00")],
        portal: vec![portal_row(2, "A1", "100.01"), portal_row(3, "A2", "100.02")],
    };
    let result = run(&absolute(0.0), &input).unwrap();
    assert_eq!(result.class_of(Source::Company, "company#2"), Some(MatchClass::Matched));
    assert_eq!(
        result.class_of(Source::Company, "company#3"),
        Some(MatchClass::UnmatchedCompany)
    );
}

#[test]
fn same_date_rule_blocks_buffer_pair() {
    let mut config = absolute(10.0);
    config.buffer.require_same_date = true;
    let input = ReconInput {
        company: vec![company_row(2, "A1", "100").with_text("Invoice Date", "01-02-2024")],
        portal: vec![portal_row(2, "A1", "98").with_text("Invoice Date", "02/02/2024")],
    };
    let result = run(&config, &input).unwrap();
    assert!(result.buffer_matched.is_empty());
    assert_eq!(result.unmatched_company.len(), 1);
    assert_eq!(result.unmatched_portal.len(), 1);
}

#[test]
fn negative_amount_is_clamped_and_flagged() {
    let input = ReconInput {
        company: vec![company_row(2, "A1", "(25.00)")],
        portal: vec![portal_row(2, "A1", "0")],
    };
    let result = run(&absolute(1.0), &input).unwrap();
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].company.flags.len(), 1);
    assert_eq!(result.summary.flagged_records, 1);
}

#[test]
fn unknown_mapping_field_is_a_config_error() {
    let mut config = ReconConfig::default();
    config
        .column_mappings
        .portal
        .insert("cess".into(), "Cess(₹)".into());
    let err = run(&config, &ReconInput::default()).unwrap_err();
    assert!(matches!(err, ReconError::UnknownField { source: Source::Portal, .. }));
}
