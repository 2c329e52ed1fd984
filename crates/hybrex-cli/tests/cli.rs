use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const RULES: &str = r#"
- name: invoice_number
  pattern: 'invoice\s*#\s*(\d+)'
  flags: i
  group: 1
  confidence: 0.9
  validators: [non_empty]
- name: seller_nip
  pattern: 'NIP:?\s*([\d-]{10,13})'
  group: 1
  validators: [nip]
- name: doc_class
  plugin: doc_type
"#;

/// A command isolated from the user's real configuration directory.
fn hybrex(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hybrex").unwrap();
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.yaml");
    fs::write(&rules, RULES).unwrap();
    (dir, rules)
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_extract_plain_text() {
    let (dir, rules) = setup();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, "Invoice # 4821\nNIP: 526-104-08-28\n").unwrap();

    let json = stdout_json(hybrex(dir.path()).arg("extract").arg(&input).arg("-r").arg(&rules));

    assert_eq!(json["invoice_number"], "4821");
    assert_eq!(json["seller_nip"], "526-104-08-28");
    assert_eq!(json["invoice_number_confidence"], 0.9);
    assert!(json.get("__debug__").is_none());
}

#[test]
fn test_extract_debug_and_no_confidence_keys() {
    let (dir, rules) = setup();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, "Invoice # 4821\nNIP: 1234567890\n").unwrap();

    let json = stdout_json(
        hybrex(dir.path())
            .arg("extract")
            .arg(&input)
            .arg("-r")
            .arg(&rules)
            .arg("--debug")
            .arg("--no-confidence-keys"),
    );

    assert!(json.get("invoice_number_confidence").is_none());
    assert!(json.get("seller_nip").is_none());

    let trace = json["__debug__"].as_array().unwrap();
    assert_eq!(trace.len(), 3);
    assert_eq!(trace[1]["rule_name"], "seller_nip");
    assert_eq!(trace[1]["matched"], true);
    assert_eq!(trace[1]["final_accepted"], false);
}

#[test]
fn test_extract_json_document_to_file() {
    let (dir, rules) = setup();
    let input = dir.path().join("scan.json");
    fs::write(
        &input,
        r#"{"doc_id": "scan-7", "text": "Reisepass", "tokens": [{"text": "Reisepass", "bbox": [0, 0, 80, 12]}]}"#,
    )
    .unwrap();
    let output = dir.path().join("out/scan.fields.json");

    hybrex(dir.path())
        .arg("extract")
        .arg(&input)
        .arg("-r")
        .arg(&rules)
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 1 fields"));

    let json: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["doc_class"], "passport");
    assert_eq!(json["doc_class_confidence"], 0.5);
}

#[test]
fn test_extract_without_rules_fails() {
    let (dir, _) = setup();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, "Invoice # 1").unwrap();

    hybrex(dir.path())
        .arg("extract")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rule file given"));
}

#[test]
fn test_extract_rules_path_from_config() {
    let (dir, rules) = setup();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, "Invoice # 99").unwrap();

    let config = dir.path().join("config.json");
    fs::write(
        &config,
        serde_json::json!({"rules": {"path": rules}, "output": {"pretty": false}}).to_string(),
    )
    .unwrap();

    let json = stdout_json(hybrex(dir.path()).arg("-c").arg(&config).arg("extract").arg(&input));
    assert_eq!(json["invoice_number"], "99");
}

#[test]
fn test_malformed_rules_rejected() {
    let (dir, _) = setup();
    let rules = dir.path().join("bad.yaml");
    fs::write(&rules, "- name: bad\n  pattern: '(unclosed'\n").unwrap();
    let input = dir.path().join("invoice.txt");
    fs::write(&input, "Invoice # 1").unwrap();

    hybrex(dir.path())
        .arg("extract")
        .arg(&input)
        .arg("-r")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pattern"));
}

#[test]
fn test_batch_writes_one_output_per_input() {
    let (dir, rules) = setup();
    let inputs = dir.path().join("in");
    fs::create_dir_all(&inputs).unwrap();
    for i in 0..5 {
        fs::write(inputs.join(format!("doc_{i}.txt")), format!("Invoice # {i}00")).unwrap();
    }
    let out = dir.path().join("out");

    hybrex(dir.path())
        .arg("batch")
        .arg(format!("{}/*.txt", inputs.display()))
        .arg("-r")
        .arg(&rules)
        .arg("-o")
        .arg(&out)
        .arg("-j")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("5 successful, 0 failed"));

    for i in 0..5 {
        let json: Value =
            serde_json::from_str(&fs::read_to_string(out.join(format!("doc_{i}.json"))).unwrap())
                .unwrap();
        assert_eq!(json["invoice_number"], format!("{i}00"));
    }
}

#[test]
fn test_batch_continue_on_error() {
    let (dir, rules) = setup();
    let inputs = dir.path().join("in");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("good.json"), r#"{"text": "Invoice # 1"}"#).unwrap();
    fs::write(inputs.join("broken.json"), "{ not a document").unwrap();

    hybrex(dir.path())
        .arg("batch")
        .arg(format!("{}/*.json", inputs.display()))
        .arg("-r")
        .arg(&rules)
        .arg("--continue-on-error")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful, 1 failed"));

    assert!(inputs.join("good.fields.json").exists());

    hybrex(dir.path())
        .arg("batch")
        .arg(format!("{}/broken.json", inputs.display()))
        .arg("-r")
        .arg(&rules)
        .assert()
        .failure();
}

#[test]
fn test_batch_rerun_skips_own_outputs() {
    let (dir, rules) = setup();
    let inputs = dir.path().join("in");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("scan.json"), r#"{"text": "Invoice # 7"}"#).unwrap();

    for _ in 0..2 {
        hybrex(dir.path())
            .arg("batch")
            .arg(format!("{}/*.json", inputs.display()))
            .arg("-r")
            .arg(&rules)
            .assert()
            .success()
            .stdout(
                predicate::str::contains("Found 1 files")
                    .and(predicate::str::contains("1 successful, 0 failed")),
            );
    }

    assert!(inputs.join("scan.fields.json").exists());
    assert!(!inputs.join("scan.fields.fields.json").exists());
}

#[test]
fn test_batch_failure_cancels_pending_files() {
    let (dir, rules) = setup();
    let inputs = dir.path().join("in");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("000_broken.json"), "{ not a document").unwrap();
    for i in 0..40 {
        fs::write(inputs.join(format!("doc_{i:02}.json")), r#"{"text": "Invoice # 1"}"#).unwrap();
    }
    let out = dir.path().join("out");

    hybrex(dir.path())
        .arg("batch")
        .arg(format!("{}/*.json", inputs.display()))
        .arg("-r")
        .arg(&rules)
        .arg("-o")
        .arg(&out)
        .arg("-j")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));

    let written = fs::read_dir(&out).unwrap().count();
    assert!(written < 40, "{written} outputs written after the first failure");
}

#[test]
fn test_rules_check_and_list() {
    let (dir, rules) = setup();

    hybrex(dir.path())
        .args(["rules", "check"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rules OK"));

    let unknown = dir.path().join("unknown.yaml");
    fs::write(&unknown, "- {name: a, plugin: ghost}\n").unwrap();
    hybrex(dir.path())
        .args(["rules", "check"])
        .arg(&unknown)
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown plugin: ghost"));

    hybrex(dir.path())
        .args(["rules", "list"])
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("seller_nip").and(predicate::str::contains("[nip]")));
}

#[test]
fn test_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hybrex.json");

    hybrex(dir.path())
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .success();

    hybrex(dir.path())
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    hybrex(dir.path())
        .args(["config", "init", "--force", "-o"])
        .arg(&path)
        .assert()
        .success();

    let json = stdout_json(hybrex(dir.path()).arg("-c").arg(&path).args(["config", "show"]));
    assert_eq!(json["batch"]["jobs"], 4);
    assert_eq!(json["plugins"]["builtins"], true);
}
