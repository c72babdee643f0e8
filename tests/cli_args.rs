//! Command-line parsing and exit status tests. None of these need model files.

#![allow(deprecated)] // cargo_bin deprecation

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_options() {
    let mut cmd = Command::cargo_bin("gaze-pointer").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("--input-type")
            .and(predicate::str::contains("--device"))
            .and(predicate::str::contains("--no-pointer")),
    );
}

#[test]
fn test_input_type_is_required() {
    let mut cmd = Command::cargo_bin("gaze-pointer").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--input-type"));
}

#[test]
fn test_video_without_input_rejected() {
    let mut cmd = Command::cargo_bin("gaze-pointer").unwrap();
    cmd.args(["-t", "video"]);
    cmd.assert().failure().stderr(predicate::str::contains("--input"));
}

#[test]
fn test_unknown_device_rejected() {
    let mut cmd = Command::cargo_bin("gaze-pointer").unwrap();
    cmd.args(["-t", "cam", "-d", "tpu"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cuda").and(predicate::str::contains("openvino")));
}

#[test]
fn test_missing_models_exit_one_and_create_config() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("face.png");
    image::RgbImage::from_pixel(64, 48, image::Rgb([120, 110, 100]))
        .save(&image)
        .unwrap();

    let mut cmd = Command::cargo_bin("gaze-pointer").unwrap();
    cmd.current_dir(dir.path())
        .args(["-t", "image", "--no-pointer", "-c", "config.json", "-i"])
        .arg(&image);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("face-detection-adas-0001"));

    assert!(dir.path().join("config.json").exists());
}

#[test]
fn test_benchmark_missing_models_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("benchmark").unwrap();
    cmd.current_dir(dir.path());
    cmd.assert().code(1);
}

#[test]
fn test_inspect_rejects_non_model_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.onnx");
    std::fs::write(&path, b"definitely not protobuf").unwrap();

    let mut cmd = Command::cargo_bin("inspect_model").unwrap();
    cmd.arg(&path);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load model"));
}
