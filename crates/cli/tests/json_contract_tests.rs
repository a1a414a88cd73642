// Integration tests enforcing the `gstmatch run --json` stdout contract.
//
// stdout from --json must be:
//   1. Exactly one JSON value, with logging and the summary kept on stderr
//   2. Stable in key order and byte-identical across runs
//   3. The documented result shape
//
// Run with: cargo test -p gstmatch-cli --test json_contract_tests -- --nocapture

use std::process::{Command, Output};

fn gstmatch() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gstmatch"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd
}

const FIXTURE: &str = "../recon/tests/fixtures/gst.recon.toml";

fn run_fixture(extra: &[&str]) -> Output {
    let output = gstmatch()
        .args(["run", FIXTURE, "--json"])
        .args(extra)
        .output()
        .expect("gstmatch run --json");
    assert!(
        output.status.success(),
        "exit code: {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Assert stdout is a single, parseable JSON value.
fn assert_single_json(stdout: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed).unwrap_or_else(|e| {
        panic!("stdout must be valid JSON.\nParse error: {}\nstdout:\n{}", e, trimmed)
    })
}

fn keys(value: &serde_json::Value) -> Vec<&str> {
    value
        .as_object()
        .expect("JSON object")
        .keys()
        .map(String::as_str)
        .collect()
}

#[test]
fn stdout_is_one_json_value_even_when_verbose() {
    let output = run_fixture(&["-vv"]);
    assert_single_json(&output.stdout);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("normalized"), "debug logging goes to stderr: {stderr}");
}

#[test]
fn top_level_shape() {
    let val = assert_single_json(&run_fixture(&[]).stdout);
    assert_eq!(
        keys(&val),
        [
            "meta",
            "summary",
            "matched",
            "buffer_matched",
            "unmatched_company",
            "unmatched_portal",
            "skipped",
        ]
    );
    assert_eq!(
        keys(&val["meta"]),
        ["config_name", "engine_version", "tolerance", "require_same_date"]
    );
    assert_eq!(val["meta"]["engine_version"], env!("CARGO_PKG_VERSION"));
    assert!(val["meta"].get("generated_at").is_none(), "no timestamps in the result");
}

#[test]
fn pair_and_record_shape() {
    let val = assert_single_json(&run_fixture(&[]).stdout);

    let pair = &val["buffer_matched"][0];
    assert_eq!(keys(pair), ["class", "key", "company", "portal", "discrepancy_paise"]);
    assert_eq!(pair["class"], "buffer_matched");
    assert!(pair["discrepancy_paise"].is_i64());

    let record = &pair["company"];
    assert_eq!(record["source"], "company");
    assert_eq!(record["raw_row_id"], "company#3");
    assert_eq!(record["invoice_date"], "2024-01-16");
    assert_eq!(record["total_tax_paise"], 100000);
    assert_eq!(record["party_name"], "Acme Traders");

    // Optional fields are omitted rather than null
    let portal = &pair["portal"];
    assert!(portal.get("party_name").is_none());
    assert!(portal.get("flags").is_none());
}

#[test]
fn skipped_rows_are_reported() {
    let val = assert_single_json(&run_fixture(&[]).stdout);
    let skipped = val["skipped"].as_array().expect("skipped array");
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["source"], "company");
    assert_eq!(skipped[0]["field"], "gstin");
}

#[test]
fn output_is_byte_identical_across_runs() {
    let first = run_fixture(&["-q"]).stdout;
    let second = run_fixture(&["-q"]).stdout;
    assert_eq!(first, second);
}
