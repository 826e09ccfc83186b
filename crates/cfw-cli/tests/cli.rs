use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("cfw").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("training"))
        .stdout(predicate::str::contains("tuning"))
        .stdout(predicate::str::contains("composites"))
        .stdout(predicate::str::contains("cfw-processing"))
        .stdout(predicate::str::contains("benchmarks"))
        .stdout(predicate::str::contains("all"));
}

#[test]
fn missing_required_arguments_is_a_usage_error() {
    let mut cmd = Command::cargo_bin("cfw").unwrap();
    cmd.args(["training", "--year", "2024", "--project-id", "p1", "--run-id", "r1"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn class_order_not_starting_with_forest_non_forest_is_a_config_error() {
    let tmp = tempdir().unwrap();
    let training_features = tmp.path().join("features.json");
    let mosaic_catalog = tmp.path().join("mosaics.json");
    fs::write(&training_features, "[]").unwrap();
    fs::write(&mosaic_catalog, "[]").unwrap();

    let mut cmd = Command::cargo_bin("cfw").unwrap();
    cmd.args([
        "training",
        "--year",
        "2024",
        "--project-id",
        "p1",
        "--run-id",
        "r1",
        "--runs-root",
        tmp.path().to_str().unwrap(),
        "--start-month",
        "1",
        "--end-month",
        "1",
        "--class-order",
        "Water",
        "NonForest",
        "--training-features",
        training_features.to_str().unwrap(),
        "--mosaic-catalog",
        mosaic_catalog.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("config error"));
}

#[test]
fn benchmarks_with_no_reference_rasters_is_a_config_error() {
    let tmp = tempdir().unwrap();
    let references = tmp.path().join("refs.json");
    fs::write(&references, "[]").unwrap();

    let mut cmd = Command::cargo_bin("cfw").unwrap();
    cmd.args([
        "benchmarks",
        "--year",
        "2024",
        "--project-id",
        "p1",
        "--run-id",
        "r1",
        "--runs-root",
        tmp.path().to_str().unwrap(),
        "--references",
        references.to_str().unwrap(),
        "--prediction-raster",
        "missing.tif",
    ])
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("benchmarks requires at least one reference raster"));
}
