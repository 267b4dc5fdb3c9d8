// End-to-end tests for the mergepart binary
//
// Writes the demo part through the CLI, then verifies it with the same binary

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn mergepart(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mergepart"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run mergepart binary")
}

fn run_demo(root: &Path, extra: &[&str]) -> serde_json::Value {
    let root = root.to_str().unwrap();
    let mut args = vec!["demo", "--root", root, "--rows", "1000", "--block-rows", "300"];
    args.extend_from_slice(extra);

    let output = mergepart(&args);
    assert!(
        output.status.success(),
        "demo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("demo output is not JSON")
}

#[test]
fn test_demo_then_verify() {
    let temp_dir = TempDir::new().unwrap();
    let summary = run_demo(temp_dir.path(), &[]);

    assert_eq!(summary["rows"], 1000);
    let columns: Vec<&str> = summary["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    // flags only ever holds zeros
    assert_eq!(columns, vec!["id", "event_date", "message"]);

    let files: Vec<&str> = summary["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    for expected in [
        "by_message.proj",
        "checksums.txt",
        "count.txt",
        "minmax_event_date.idx",
        "partition.dat",
        "primary.idx",
        "uuid.txt",
    ] {
        assert!(files.contains(&expected), "missing {}", expected);
    }
    assert!(!files.contains(&"flags.bin"));

    let output = mergepart(&[
        "verify",
        "--root",
        temp_dir.path().to_str().unwrap(),
        "all_1_1_0",
    ]);
    assert!(
        output.status.success(),
        "verify failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("OK"));
}

#[test]
fn test_verify_detects_tampering() {
    let temp_dir = TempDir::new().unwrap();
    run_demo(temp_dir.path(), &["--part", "tampered", "--no-sync"]);

    std::fs::write(temp_dir.path().join("tampered/count.txt"), "999").unwrap();

    let output = mergepart(&[
        "verify",
        "--root",
        temp_dir.path().to_str().unwrap(),
        "tampered",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("count.txt"));
}

#[test]
fn test_config_prints_effective_settings() {
    let output = Command::new(env!("CARGO_BIN_EXE_mergepart"))
        .arg("config")
        .env("MERGEPART_INDEX_GRANULARITY", "1024")
        .output()
        .expect("Failed to run mergepart binary");
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["writer"]["index_granularity"], 1024);
}
