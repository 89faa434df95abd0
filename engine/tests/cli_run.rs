use std::fs;
use std::process::Command;

use tempfile::tempdir;

const HOUSEHOLD: &str = r#"{"income": "30,000", "housing": 12000, "utilities": 2500, "groceries": 5000, "transport": 3000, "debt_minimums": 2000}"#;

fn calcdesk() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_calcdesk"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_shows_every_calculator() {
    let output = calcdesk().arg("list").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "amortization-schedule",
        "mortgage-repayment",
        "adjustable-rate-mortgage",
        "rent-vs-buy",
        "debt-payoff",
        "minimum-payment-trap",
        "investment-growth",
        "present-value",
        "income-vs-essentials",
        "floor-joist-spacing",
        "cumulative-gpa",
        "decimal-to-fraction",
        "fraction-to-decimal",
        "deadline",
        "business-days-between",
        "resistor-color-code",
    ] {
        assert!(stdout.contains(name), "list output missing {}; got:\n{}", name, stdout);
    }
}

#[test]
fn test_run_inline_params_as_text() {
    let output = calcdesk()
        .args(["run", "income-vs-essentials", "--params", HOUSEHOLD])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Income vs Essentials\n"));
    assert!(
        stdout.contains("  Headline: Readiness: Borderline (1.22× coverage)"),
        "unexpected output:\n{}",
        stdout
    );
}

#[test]
fn test_run_from_file_as_html() {
    let dir = tempdir().unwrap();
    let params = dir.path().join("params.json");
    fs::write(&params, r#"{"decimal": "0.375"}"#).unwrap();

    let output = calcdesk()
        .args(["run", "decimal-to-fraction", "--format", "html", "--input"])
        .arg(&params)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("<div class=\"result success\">"), "got:\n{}", stdout);
    assert!(stdout.contains("3/8"));
}

#[test]
fn test_error_report_is_rendered_with_failing_exit_code() {
    let output = calcdesk()
        .args(["run", "mortgage-repayment", "--format", "json", "--params", r#"{"loan_amount": "", "annual_rate": 6, "term_years": 30}"#])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "error");
    assert_eq!(report["calculator"], "mortgage-repayment");
}

#[test]
fn test_settings_file_changes_format_and_policy() {
    let dir = tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    fs::write(
        &settings,
        r#"{"output_format": "csv", "defaults": {"essentials": {"policy": "coverage"}}}"#,
    )
    .unwrap();

    let output = calcdesk()
        .args(["run", "income-vs-essentials", "--params", HOUSEHOLD, "--settings"])
        .arg(&settings)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Field,Value\n"), "got:\n{}", stdout);
    assert!(stdout.contains("Headline,Readiness: Stable (1.22× coverage)"));
}

#[test]
fn test_unknown_calculator_fails() {
    let output = calcdesk().args(["run", "stock-picker"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown calculator: stock-picker"), "got:\n{}", stderr);
}

#[test]
fn test_malformed_inputs_fail_before_running() {
    let output = calcdesk()
        .args(["run", "deadline", "--params", "{not json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Parameters are not valid JSON"));

    let dir = tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    fs::write(&settings, r#"{"port": 50051}"#).unwrap();
    let output = calcdesk()
        .args(["list", "--settings"])
        .arg(&settings)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load settings"));
}
