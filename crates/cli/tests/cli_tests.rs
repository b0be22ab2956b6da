// Integration tests for the `smeta` binary.
// Run with: cargo test -p smeta-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn smeta() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_smeta"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("SMETA_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn corpus() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../io/tests/fixtures/corpus")
}

fn document(name: &str) -> PathBuf {
    corpus().join("Школы").join(name)
}

fn run_json(args: &[&str]) -> (Output, serde_json::Value) {
    let output = smeta().args(args).output().expect("smeta run");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value = serde_json::from_str(&stdout).unwrap_or(serde_json::Value::Null);
    (output, value)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_with_flags_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("combined_output.xlsx");
    let (output, json) = run_json(&[
        "run",
        "--input",
        corpus().to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--json",
    ]);

    assert!(output.status.success(), "exit code was {:?}", output.status);
    assert!(out.is_file());
    assert_eq!(json["summary"]["documents"], 3);
    assert_eq!(json["summary"]["skipped"], 1);
    assert_eq!(json["summary"]["detail_rows"], 2);

    let outcomes = json["outcomes"].as_array().unwrap();
    let skipped: Vec<&serde_json::Value> =
        outcomes.iter().filter(|o| o["status"] == "skipped").collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["file"], "ЛС-02-01-02.gge");

    let groups = json["groups"].as_array().unwrap();
    assert_eq!(groups.len() as u64, json["summary"]["grouped_rows"].as_u64().unwrap());
    let records: u64 = groups
        .iter()
        .map(|g| g["record_count"].as_u64().unwrap())
        .sum();
    assert_eq!(records, 2);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("processed 2 of 3 documents"), "stderr: {stderr}");
}

#[test]
fn run_from_config_with_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("NLSR.csv"),
        "Name;Keyword\nКровля;кровл\n",
    )
    .unwrap();
    let config = dir.path().join("smeta.toml");
    std::fs::write(
        &config,
        format!(
            "input_dir = {:?}\noutput = \"out/report.xlsx\"\nclassification = \"NLSR.csv\"\n\
             unit_economics = \"missing-TEP.xlsx\"\nper_document_dir = \"docs\"\n\
             lsr_summary = \"LSR_combined.xlsx\"\n",
            corpus().to_str().unwrap()
        ),
    )
    .unwrap();

    let output = smeta()
        .args(["run", "--config", config.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(dir.path().join("out/report.xlsx").is_file());
    assert!(dir.path().join("LSR_combined.xlsx").is_file());
    assert!(dir.path().join("docs/ЛС-02-01-01.xlsx").is_file());
    assert!(dir.path().join("docs/ЛСР-05-01-01.xlsx").is_file());

    // missing TEP table is tolerated
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unit-economics table unavailable"), "stderr: {stderr}");
}

#[test]
fn empty_corpus_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let output = smeta()
        .args(["run", "--input", dir.path().to_str().unwrap()])
        .args(["--output", dir.path().join("o.xlsx").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn unwritable_report_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let output = smeta()
        .args(["run", "--input", corpus().to_str().unwrap()])
        .args(["--output", blocker.join("o.xlsx").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn non_xlsx_output_exits_3() {
    let output = smeta()
        .args(["run", "--input", corpus().to_str().unwrap(), "--output", "report.csv"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ---------------------------------------------------------------------------
// inspect / validate
// ---------------------------------------------------------------------------

#[test]
fn inspect_prints_rollup() {
    let output = smeta()
        .args(["inspect", document("ЛС-02-01-01.gge").to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["price_level"], "Current");
    assert_eq!(json["priced_items"], 2);
    assert_eq!(json["rollup"]["Итого по смете"], 1680.5);
    assert_eq!(json["rollup"]["СНБ"], 500.5);
    assert_eq!(json["header"]["Reason"], "ЛС-02-01-01");
    assert_eq!(json["header"]["RegionCode"], "77");
}

#[test]
fn inspect_broken_document_fails() {
    let output = smeta()
        .args(["inspect", document("ЛС-02-01-02.gge").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Estimate"));
}

#[test]
fn inspect_missing_file_is_usage_error() {
    let output = smeta().args(["inspect", "/nonexistent/a.gge"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn validate_reports_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "input_dir = \"data\"\n").unwrap();
    let output = smeta().args(["validate", good.to_str().unwrap()]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("ok:"));

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "input_dir = \"data\"\nitem_prefix = \"\"\n").unwrap();
    let output = smeta().args(["validate", bad.to_str().unwrap()]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("item_prefix"));
}
