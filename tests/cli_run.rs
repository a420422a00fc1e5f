// tests/cli_run.rs
//
// Drives the `rundag::run` entry point with a pipeline definition on disk.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rundag::cli::CliArgs;
use rundag_test_utils::{init_tracing, with_timeout};

/// Write `Rundag.toml` into a fresh temp dir; commands run from that dir.
fn pipeline(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Rundag.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn args(config: &Path) -> CliArgs {
    CliArgs {
        config: Some(config.to_path_buf()),
        policy: None,
        log_level: None,
        dry_run: false,
        json: false,
    }
}

const PIPELINE: &str = r#"
[config]
retries = 0
retry_delay = "0s"

[step.setup]
cmd = "touch setup.ran && SETUP_CMD"
critical = true

[step.node]
cmd = "touch node.ran"
after = ["setup"]
branch = "1"

[step.report]
cmd = "touch report.ran && REPORT_CMD"
after = ["node"]
report = true
"#;

fn definition(setup: &str, report: &str) -> String {
    PIPELINE
        .replace("SETUP_CMD", setup)
        .replace("REPORT_CMD", report)
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();
    let (dir, path) = pipeline(&definition("true", "true"));

    let mut args = args(&path);
    args.dry_run = true;
    let code = with_timeout(rundag::run(args)).await.unwrap();

    assert_eq!(code, 0);
    for marker in ["setup.ran", "node.ran", "report.ran"] {
        assert!(!dir.path().join(marker).exists(), "{marker} was executed");
    }
}

#[tokio::test]
async fn clean_run_exits_zero() {
    init_tracing();
    let (dir, path) = pipeline(&definition("true", "true"));

    let code = with_timeout(rundag::run(args(&path))).await.unwrap();

    assert_eq!(code, 0);
    for marker in ["setup.ran", "node.ran", "report.ran"] {
        assert!(dir.path().join(marker).exists(), "{marker} did not run");
    }
}

#[tokio::test]
async fn json_mode_runs_the_pipeline() {
    init_tracing();
    let (dir, path) = pipeline(&definition("true", "true"));

    let mut args = args(&path);
    args.json = true;
    let code = with_timeout(rundag::run(args)).await.unwrap();

    assert_eq!(code, 0);
    assert!(dir.path().join("report.ran").exists());
}

#[tokio::test]
async fn failed_setup_aborts_with_exit_code_two() {
    init_tracing();
    let (dir, path) = pipeline(&definition("exit 1", "true"));

    let code = with_timeout(rundag::run(args(&path))).await.unwrap();

    assert_eq!(code, 2);
    assert!(dir.path().join("setup.ran").exists());
    assert!(!dir.path().join("node.ran").exists());
    assert!(!dir.path().join("report.ran").exists());
}

#[tokio::test]
async fn failed_report_step_alone_exits_one() {
    init_tracing();
    let (dir, path) = pipeline(&definition("true", "exit 4"));

    let code = with_timeout(rundag::run(args(&path))).await.unwrap();

    assert_eq!(code, 1);
    assert!(dir.path().join("node.ran").exists());
    assert!(dir.path().join("report.ran").exists());
}

#[tokio::test]
async fn invalid_definition_is_an_error() {
    let (_dir, path) = pipeline(
        r#"
[step.a]
cmd = "true"
after = ["missing"]
"#,
    );

    let err = with_timeout(rundag::run(args(&path))).await.unwrap_err();
    assert!(err.to_string().contains("unknown dependency"), "{err}");
}
