//! CLI command integration tests.
//! Each test uses a temp directory via MIE_DATA_DIR for full isolation.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCENARIO: &str = r#"
n_particle_re = 1.5
n_particle_im = 0.001
n_host = 1.33
effective_model = false

[distribution]
kind = "log_normal"
mu = 0.5
sigma = 0.3

[wavelengths]
min = 0.4
max = 0.8
n = 2

[diameters]
min = 1.0
max = 2.0
n = 2
"#;

fn mie_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("mie").unwrap();
    cmd.env("MIE_DATA_DIR", data_dir.path().join("cache"));
    cmd
}

fn write_scenario(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("scenario.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn compute(dir: &TempDir, scenario: &PathBuf, extra: &[&str]) -> String {
    let output = mie_cmd(dir)
        .args(["compute", "--workers", "2", "--scenario"])
        .arg(scenario)
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn compute_then_hit() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);

    let first = compute(&dir, &scenario, &[]);
    assert!(first.ends_with(".mie"), "{first}");
    assert!(PathBuf::from(&first).exists());

    let second = compute(&dir, &scenario, &[]);
    assert_eq!(first, second);
}

#[test]
fn force_gives_new_artifact() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);

    let first = compute(&dir, &scenario, &[]);
    let forced = compute(&dir, &scenario, &["--force"]);
    assert_ne!(first, forced);

    mie_cmd(&dir)
        .args(["lookup", "--scenario"])
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains(forced));
}

#[test]
fn lookup_before_and_after_compute() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);

    mie_cmd(&dir)
        .args(["lookup", "--scenario"])
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not cached"));

    let path = compute(&dir, &scenario, &[]);

    mie_cmd(&dir)
        .args(["lookup", "--scenario"])
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains(path));
}

#[test]
fn list_fresh_and_populated() {
    let dir = TempDir::new().unwrap();
    mie_cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no entries)"));

    let scenario = write_scenario(&dir, SCENARIO);
    compute(&dir, &scenario, &[]);

    mie_cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("lognormal"))
        .stdout(predicate::str::contains("raw"))
        .stdout(predicate::str::contains(".mie"));
}

#[test]
fn show_summary_and_json() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);
    let path = compute(&dir, &scenario, &[]);

    mie_cmd(&dir)
        .args(["show", path.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("particles:   2"))
        .stdout(predicate::str::contains("inverse_cdf=1000x2"));

    let output = mie_cmd(&dir).args(["show", "--json", path.as_str()]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["particleID"], serde_json::json!([0, 1]));
    assert_eq!(value["wavelengths"], serde_json::json!([0.4, 0.8]));
    assert_eq!(value["particleData"]["1"]["diameter"], serde_json::json!(2.0));
}

#[test]
fn background_compute_prints_path() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, SCENARIO);

    let path = compute(&dir, &scenario, &["--background"]);
    assert!(PathBuf::from(&path).exists());
    assert_eq!(compute(&dir, &scenario, &[]), path);
}

#[test]
fn invalid_scenario_rejected() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, &SCENARIO.replace("n = 2\n\n[diameters]", "n = 0\n\n[diameters]"));

    mie_cmd(&dir)
        .args(["compute", "--scenario"])
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn effective_with_few_diameters_rejected() {
    let dir = TempDir::new().unwrap();
    let scenario = write_scenario(&dir, &SCENARIO.replace("effective_model = false", "effective_model = true"));

    mie_cmd(&dir)
        .args(["compute", "--scenario"])
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 10"));

    mie_cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no entries)"));
}

#[test]
fn missing_scenario_file_fails() {
    let dir = TempDir::new().unwrap();
    mie_cmd(&dir)
        .args(["compute", "--scenario", "/nonexistent/scenario.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load scenario"));
}
