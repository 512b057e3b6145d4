use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use approx::assert_abs_diff_eq;
use serde_json::Value;
use tempfile::tempdir;

const SNAPSHOT: &str = r#"{
    "mean_hcle_2024": 0.3375,
    "beta_ranking": [
        {"Variabel": "NEET", "Koefisien (Beta)": -0.0082, "P-Value": 0.01, "Magnitudo Dampak": 0.0082}
    ],
    "trend_data": [
        {"Tahun": 2023, "HCLE": 0.3525, "NEET": 22.1},
        {"Tahun": 2024, "HCLE": 0.3375, "NEET": 22.4}
    ]
}"#;

fn hcle(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hcle"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run hcle cli")
}

fn json_report(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "CLI exited with status {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("report is JSON")
}

#[test]
fn untouched_scenario_simulates_the_demo_change() {
    let tmp = tempdir().expect("temporary directory");
    let report = json_report(&hcle(tmp.path(), &["simulate", "--json"]));

    assert_eq!(report["status"], "Unset");
    assert_eq!(report["live_data"], false);
    let neet = &report["result"]["contributions"]["NEET"];
    assert_abs_diff_eq!(neet["change"].as_f64().unwrap(), 0.05);
    assert_abs_diff_eq!(
        report["result"]["predicted_value"].as_f64().unwrap(),
        0.3492 + 0.00028,
        epsilon = 1e-12
    );
    assert_eq!(report["attributions"].as_array().unwrap().len(), 1);
}

#[test]
fn no_demo_flag_keeps_the_base() {
    let tmp = tempdir().expect("temporary directory");
    let report = json_report(&hcle(tmp.path(), &["simulate", "--json", "--no-demo"]));

    let result = &report["result"];
    assert!(result["contributions"].as_object().unwrap().is_empty());
    assert_eq!(result["predicted_value"], result["base_value"]);
    assert_eq!(result["total_delta"].as_f64().unwrap(), 0.0);
    assert!(report["attributions"].as_array().unwrap().is_empty());
}

#[test]
fn unreachable_snapshot_prints_a_notice_and_still_simulates() {
    let tmp = tempdir().expect("temporary directory");
    let output = hcle(
        tmp.path(),
        &[
            "simulate",
            "--snapshot",
            "missing.json",
            "--change",
            "Internet=-10",
            "--json",
        ],
    );
    let report = json_report(&output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("live data is unavailable"), "stderr: {stderr}");
    assert_eq!(report["live_data"], false);
    assert_eq!(report["status"], "Mixed");
    assert_abs_diff_eq!(
        report["result"]["contributions"]["Internet"]["impact"]
            .as_f64()
            .unwrap(),
        0.0158,
        epsilon = 1e-12
    );
}

#[test]
fn config_overrides_win_over_live_coefficients() {
    let tmp = tempdir().expect("temporary directory");
    fs::write(tmp.path().join("dashboard.json"), SNAPSHOT).expect("write snapshot");
    fs::write(
        tmp.path().join("hcle.toml"),
        "snapshot = \"dashboard.json\"\n\n[coefficients]\nNEET = 0.01\n",
    )
    .expect("write config");

    let report = json_report(&hcle(
        tmp.path(),
        &["simulate", "--config", "hcle.toml", "--change", "NEET=10", "--json"],
    ));

    assert_eq!(report["live_data"], true);
    assert_eq!(report["status"], "Positive");
    let result = &report["result"];
    assert_abs_diff_eq!(result["base_value"].as_f64().unwrap(), 0.3375);
    assert_abs_diff_eq!(
        result["contributions"]["NEET"]["impact"].as_f64().unwrap(),
        0.001,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        result["predicted_value"].as_f64().unwrap(),
        0.3385,
        epsilon = 1e-12
    );
}

#[test]
fn negative_base_is_rejected() {
    let tmp = tempdir().expect("temporary directory");
    for args in [
        ["simulate", "--base", "-0.1"],
        ["simulate", "--base=-0.1", "--no-demo"],
    ] {
        let output = hcle(tmp.path(), &args);
        assert!(!output.status.success(), "accepted {args:?}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("Base value must be finite and non-negative"),
            "stderr: {stderr}"
        );
    }
}

#[test]
fn coefficients_and_trend_show_published_values() {
    let tmp = tempdir().expect("temporary directory");
    fs::write(tmp.path().join("dashboard.json"), SNAPSHOT).expect("write snapshot");

    let output = hcle(
        tmp.path(),
        &["coefficients", "--snapshot", "dashboard.json"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("P-value"), "stdout: {stdout}");
    assert!(stdout.contains("0.0100"), "stdout: {stdout}");

    let output = hcle(tmp.path(), &["trend", "--snapshot", "dashboard.json"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2023"), "stdout: {stdout}");
    assert!(
        stdout.contains("Latest (2024): HCLE -0.0150 vs previous year, NEET +0.3 pp"),
        "stdout: {stdout}"
    );
}
