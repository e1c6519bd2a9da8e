#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn write_scene(path: &Path, with_sheet: bool) {
    let img = image::RgbImage::from_fn(640, 480, |x, y| {
        if with_sheet && (166..474).contains(&x) && (40..439).contains(&y) {
            image::Rgb([238, 238, 234])
        } else {
            image::Rgb([60, 70, 80])
        }
    });
    img.save(path).expect("write scene");
}

fn cli() -> Command {
    Command::cargo_bin("paper-rectify").expect("binary")
}

#[test]
fn rectifies_and_writes_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("scene.png");
    let out = dir.path().join("rectified.png");
    let report = dir.path().join("report.json");
    write_scene(&input, true);

    cli()
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("state=rectified"))
        .stdout(predicate::str::contains("mm/px"));

    assert!(out.exists());
    let raw = std::fs::read_to_string(&report).expect("report");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["state"], "rectified");
    assert_eq!(json["calibration"]["orientation"], "portrait");
}

#[test]
fn missing_sheet_is_reported_not_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("empty.png");
    write_scene(&input, false);

    cli()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("state=no_region"))
        .stdout(predicate::str::contains("not rectified"));
}

#[test]
fn corner_override_is_applied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("empty.png");
    let report = dir.path().join("report.json");
    write_scene(&input, false);

    cli()
        .arg(&input)
        .args(["--paper", "a4", "--corners", "180,40,460,40,460,436,180,436"])
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("state=rectified"));

    let raw = std::fs::read_to_string(&report).expect("report");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["placeholder"], false);
    assert_eq!(json["corners"][0][0], 180.0);
}

#[test]
fn config_file_is_honoured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("scene.png");
    let config = dir.path().join("config.json");
    let report = dir.path().join("report.json");
    write_scene(&input, true);
    std::fs::write(&config, r#"{ "calibration": { "aspect_tolerance": 0.0001 } }"#)
        .expect("config");

    cli()
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("uncalibrated"));

    let raw = std::fs::read_to_string(&report).expect("report");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert!(json["calibration"].is_null());
    assert!(json["calibration_rejection"].is_string());
}

#[test]
fn bad_arguments_fail() {
    cli()
        .args(["missing.png", "--corners", "1,2,3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 8"));

    cli()
        .arg("/nonexistent/scene.png")
        .assert()
        .failure();
}

#[cfg(not(feature = "tracing"))]
#[test]
fn verbose_run_logs_stage_diagnostics() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("scene.png");
    write_scene(&input, true);

    cli()
        .arg(&input)
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG detect::segment"))
        .stderr(predicate::str::contains("segmentation threshold="));
}
