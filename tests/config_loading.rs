// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use rundag::config::{ConfigFile, load_and_validate};
use rundag::dag::{BRANCH_ENV_VAR, RunGraph};
use rundag::errors::RundagError;
use rundag::types::DependencyPolicy;
use rundag_test_utils::builders::{ConfigFileBuilder, StepConfigBuilder};

fn load(contents: &str) -> Result<ConfigFile, RundagError> {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    load_and_validate(file.path())
}

#[test]
fn full_definition_resolves_into_step_specs() {
    let cfg = load(
        r#"
[config]
dependency_policy = "succeeded"
retries = 1
retry_delay = "250ms"
timeout = "30s"

[default]
env = { CI = "1", STAGE = "default" }

[step.setup]
cmd = "echo setup"
critical = true

[step.config]
cmd = "echo config"
after = ["setup"]
branch = "7"
env = { STAGE = "config" }
retries = 4
retry_delay = "1s"

[step.report]
cmd = "echo report"
after = ["config"]
report = true
"#,
    )
    .unwrap();

    assert_eq!(cfg.config.dependency_policy, DependencyPolicy::Succeeded);

    let graph = RunGraph::new(cfg.step_specs().unwrap()).unwrap();
    let setup = graph.get("setup").unwrap();
    assert!(setup.critical);
    assert_eq!(setup.retry.max_attempts, 2);
    assert_eq!(setup.retry.delay, Duration::from_millis(250));
    assert_eq!(setup.retry.timeout, Some(Duration::from_secs(30)));

    let config = graph.get("config").unwrap();
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.delay, Duration::from_secs(1));
    let ctx = config.context();
    assert_eq!(ctx.get("CI").map(String::as_str), Some("1"));
    assert_eq!(ctx.get("STAGE").map(String::as_str), Some("config"));
    assert_eq!(ctx.get(BRANCH_ENV_VAR).map(String::as_str), Some("7"));

    assert_eq!(graph.report_step().map(|s| s.name.as_str()), Some("report"));
    assert_eq!(graph.branch_steps().count(), 1);
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    let cfg = load(
        r#"
[step.only]
cmd = "true"
"#,
    )
    .unwrap();

    assert_eq!(cfg.config.dependency_policy, DependencyPolicy::Resolved);
    let specs = cfg.step_specs().unwrap();
    assert_eq!(specs[0].retry.max_attempts, 3);
    assert_eq!(specs[0].retry.delay, Duration::from_secs(5));
    assert_eq!(specs[0].retry.timeout, None);
}

#[test]
fn dag_cycle_returns_structured_error() {
    let result = load(
        r#"
[step.A]
cmd = "echo A"
after = ["B"]

[step.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    match result {
        Err(RundagError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('A') || msg.contains('B'));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_returns_config_error() {
    let result = load(
        r#"
[step.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match result {
        Err(RundagError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn invalid_definitions_are_rejected_before_running() {
    let cases = [
        ("no steps", "[config]\nretries = 1\n"),
        (
            "two critical steps",
            "[step.a]\ncmd = \"a\"\ncritical = true\n[step.b]\ncmd = \"b\"\ncritical = true\n",
        ),
        ("bad delay", "[config]\nretry_delay = \"soon\"\n[step.a]\ncmd = \"a\"\n"),
        ("zero timeout", "[step.a]\ncmd = \"a\"\ntimeout = \"0s\"\n"),
        ("empty cmd", "[step.a]\ncmd = \"  \"\n"),
        ("self dependency", "[step.a]\ncmd = \"a\"\nafter = [\"a\"]\n"),
    ];

    for (label, contents) in cases {
        match load(contents) {
            Err(RundagError::ConfigError(_)) => {}
            other => panic!("{label}: expected ConfigError, got {other:?}"),
        }
    }
}

#[test]
fn unknown_policy_is_a_toml_error() {
    let result = load(
        r#"
[config]
dependency_policy = "eventually"

[step.a]
cmd = "a"
"#,
    );
    assert!(matches!(result, Err(RundagError::TomlError(_))));
}

#[test]
fn builder_and_toml_agree() {
    let cfg = ConfigFileBuilder::new()
        .with_retries(0)
        .with_default_env("CI", "1")
        .with_step("setup", StepConfigBuilder::new("echo setup").critical().build())
        .with_step(
            "node",
            StepConfigBuilder::new("echo node")
                .after("setup")
                .branch("2")
                .build(),
        )
        .build();

    let graph = RunGraph::new(cfg.step_specs().unwrap()).unwrap();
    let node = graph.get("node").unwrap();
    assert_eq!(node.retry.max_attempts, 1);
    assert_eq!(node.context().get("NODE_ID").map(String::as_str), Some("2"));
    assert_eq!(node.context().get("CI").map(String::as_str), Some("1"));
}

#[test]
fn demo_pipeline_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/infrastructure/Rundag.toml");
    let cfg = load_and_validate(&path).unwrap();
    let graph = RunGraph::new(cfg.step_specs().unwrap()).unwrap();

    assert_eq!(graph.len(), 9);
    assert_eq!(graph.critical_step().map(|s| s.name.as_str()), Some("Global_Setup"));
    assert_eq!(graph.report_step().map(|s| s.name.as_str()), Some("Final_Report"));
    assert_eq!(graph.branch_steps().count(), 7);
    assert_eq!(graph.get("Final_Report").unwrap().retry.max_attempts, 1);
}
