//! CLI Integration Tests
//!
//! Tests the CLI binary directly using assert_cmd to exercise main.rs code paths.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FORMULAS: &str = r#"[
  {
    "path": "Contract",
    "formulas": [
      {
        "path": "Contract.total",
        "value": "x + sum(amount)",
        "parsed": {
          "vars": ["x"],
          "aggr": [{"base": "sum", "vars": ["amount"], "filter": "status == e00002v", "global": false}]
        }
      },
      {
        "path": "Contract.none",
        "value": "sum(weight)",
        "parsed": {"vars": [], "aggr": [{"base": "sum", "vars": ["weight"], "filter": null, "global": true}]}
      }
    ],
    "ids": [{"id": "e1"}]
  }
]"#;

const TREE: &str = r#"{
  "data": [
    {
      "id": "e1",
      "fields": [{"path": "x", "value": 10}, {"path": "e00002v", "value": "active"}],
      "data": [
        {"id": "i1", "fields": [{"path": "amount", "value": 3}, {"path": "status", "value": "active"}]},
        {"id": "i2", "fields": [{"path": "amount", "value": 4}, {"path": "status", "value": "closed"}]}
      ]
    }
  ]
}"#;

fn write_inputs(dir: &TempDir) -> (PathBuf, PathBuf) {
    let formulas = dir.path().join("extract_formulas.json");
    let tree = dir.path().join("data_tree.json");
    fs::write(&formulas, FORMULAS).unwrap();
    fs::write(&tree, TREE).unwrap();
    (formulas, tree)
}

fn enrich_cmd() -> Command {
    let mut cmd = Command::cargo_bin("enrich").unwrap();
    cmd.env_remove("ENRICH_PARALLEL")
        .env_remove("ENRICH_VARIABLE_PATTERN")
        .env_remove("RUST_LOG");
    cmd
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    enrich_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("enrich"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    enrich_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("enrich"));
}

#[test]
fn test_run_help() {
    enrich_cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--output"));
}

// ═══════════════════════════════════════════════════════════════════════════
// RUN COMMAND TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_run_prints_enriched_json() {
    let dir = TempDir::new().unwrap();
    let (formulas, tree) = write_inputs(&dir);

    let output = enrich_cmd()
        .arg("run")
        .arg(&formulas)
        .arg(&tree)
        .assert()
        .success()
        .stderr(predicate::str::contains("Enrichment Results"))
        .get_output()
        .stdout
        .clone();

    let results: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(results[0]["entity"], "Contract");
    assert_eq!(results[0]["id"], "e1");
    let total = &results[0]["formula_data"]["formulas"][0];
    assert_eq!(total["formula"], "Contract.total");
    assert_eq!(total["data"][0], serde_json::json!({"non_aggr": 10}));
    assert_eq!(
        total["data"][1],
        serde_json::json!({"aggr": {"base": "sum", "vars": 3, "filter": [{"e00002v": "active"}]}})
    );
    let none = &results[0]["formula_data"]["formulas"][1];
    assert_eq!(
        none["data"],
        serde_json::json!([{"aggr": {"base": "sum", "vars": [], "filter": []}}])
    );
}

#[test]
fn test_run_writes_bundle() {
    let dir = TempDir::new().unwrap();
    let (formulas, tree) = write_inputs(&dir);
    let out = dir.path().join("bundle.json");

    enrich_cmd()
        .arg("run")
        .arg(&formulas)
        .arg(&tree)
        .arg("--output")
        .arg(&out)
        .arg("--parallel")
        .assert()
        .success()
        .stdout(predicate::str::contains("Written"));

    let bundle: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(bundle["enriched"].as_array().unwrap().len(), 1);
    assert_eq!(bundle["extracted_formulas"][0]["path"], "Contract");
    assert_eq!(bundle["tree"]["data"][0]["id"], "e1");
}

#[test]
fn test_run_with_yaml_config() {
    let dir = TempDir::new().unwrap();
    let (formulas, tree) = write_inputs(&dir);
    let config = dir.path().join("enrich.yaml");
    // a pattern that never matches leaves the filter untouched
    fs::write(&config, "variable_pattern: 'zzz\\d+'\nparallel: true\n").unwrap();

    enrich_cmd()
        .arg("run")
        .arg(&formulas)
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("parallel"));
}

#[test]
fn test_run_unknown_instance_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let (formulas, _) = write_inputs(&dir);
    let tree = dir.path().join("other_tree.json");
    fs::write(&tree, r#"{"data": [{"id": "zz", "fields": []}]}"#).unwrap();
    let out = dir.path().join("bundle.json");

    enrich_cmd()
        .arg("run")
        .arg(&formulas)
        .arg(&tree)
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Lookup failed"));

    assert!(!out.exists());
}

#[test]
fn test_run_missing_file_fails() {
    enrich_cmd()
        .args(["run", "/nonexistent/formulas.json", "/nonexistent/tree.json"])
        .assert()
        .failure();
}

#[test]
fn test_run_invalid_pattern_fails() {
    let dir = TempDir::new().unwrap();
    let (formulas, tree) = write_inputs(&dir);

    enrich_cmd()
        .arg("run")
        .arg(&formulas)
        .arg(&tree)
        .args(["--variable-pattern", "(["])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

// ═══════════════════════════════════════════════════════════════════════════
// VALIDATE COMMAND TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_validate_counts() {
    let dir = TempDir::new().unwrap();
    let (formulas, _) = write_inputs(&dir);

    enrich_cmd()
        .arg("validate")
        .arg(&formulas)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1 groups, 2 formulas, 2 aggregations, 1 instances",
        ));
}

#[test]
fn test_validate_rejects_structural_errors() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.yaml");
    fs::write(&bad, "- path: Contract\n  formulas: []\n").unwrap();

    enrich_cmd()
        .arg("validate")
        .arg(&bad)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Structural input error"));
}

// ═══════════════════════════════════════════════════════════════════════════
// FILTER COMMAND TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_filter_shows_resolution() {
    enrich_cmd()
        .args([
            "filter",
            "status == e00002v and qty > e00001v",
            "--bind",
            "e00001v=5",
            "--bind",
            "e00002v=active",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("__e00002v__"))
        .stdout(predicate::str::contains("status == 'active' and qty > 5"));
}

#[test]
fn test_filter_without_variables() {
    enrich_cmd()
        .args(["filter", "status == 'active'"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No right-hand variables"));
}

#[test]
fn test_filter_missing_binding_fails() {
    enrich_cmd()
        .args(["filter", "qty > e00001v", "--bind", "e00009v=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unresolved placeholder"));
}

#[test]
fn test_filter_with_config_delimiters() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("enrich.yaml");
    fs::write(&config, "placeholder_prefix: '{{'\nplaceholder_suffix: '}}'\n").unwrap();

    enrich_cmd()
        .args(["filter", "qty > e00001v", "--bind", "e00001v=5", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("qty > {{e00001v}}"))
        .stdout(predicate::str::contains("qty > 5"));
}

#[test]
fn test_filter_accepts_written_placeholders() {
    enrich_cmd()
        .args(["filter", "status == __s__", "--bind", "s=active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status == 'active'"));
}
