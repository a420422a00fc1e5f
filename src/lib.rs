// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sink;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::dag::RunGraph;
use crate::engine::PipelineRunner;
use crate::exec::CommandExecutor;
use crate::sink::{ChannelSink, LogSink, MultiSink, StatusBoard, StatusSink};
use crate::types::DependencyPolicy;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline definition loading and validation
/// - the status sinks (status stream on stdout, or logs only with `--json`)
/// - the command executor
/// - the pipeline runner
///
/// Returns the process exit code derived from the run report.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;
    let graph = RunGraph::new(cfg.step_specs()?)?;
    let policy = args.policy.unwrap_or(cfg.config.dependency_policy);

    if args.dry_run {
        print_dry_run(&cfg, &graph, policy);
        return Ok(0);
    }

    let board = Arc::new(StatusBoard::new());
    let mut sinks = MultiSink::new(vec![board.clone() as Arc<dyn StatusSink>]);

    // With --json, stdout is reserved for the report; progress goes to the log.
    let printer = if args.json {
        sinks.push(Arc::new(LogSink));
        None
    } else {
        let (channel_sink, mut rx) = ChannelSink::new();
        sinks.push(Arc::new(channel_sink));
        Some(tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                println!("{update}");
            }
        }))
    };
    let sink: Arc<dyn StatusSink> = Arc::new(sinks);

    let executor = CommandExecutor::new()
        .with_working_dir(config_root_dir(&config_path))
        .with_log_sink(Arc::clone(&sink));

    let mut runner = PipelineRunner::new(graph, policy, Arc::new(executor), sink);
    let report = runner.run().await?;

    // Dropping the runner drops the last sender, which ends the printer.
    drop(runner);
    if let Some(printer) = printer {
        printer.await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print!("{report}");
        if let Some((step, _)) = board.aborted() {
            println!("(report step skipped because '{step}' failed)");
        }
    }

    info!(exit_code = report.exit_code(), "rundag finished");
    Ok(report.exit_code())
}

/// Directory commands run from: the definition's directory, or the current
/// working directory for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print the steps in submission order.
fn print_dry_run(cfg: &ConfigFile, graph: &RunGraph, policy: DependencyPolicy) {
    println!("rundag dry-run");
    println!("  dependency_policy = {policy}");
    println!("  config.retries = {}", cfg.config.retries);
    println!("  config.retry_delay = {}", cfg.config.retry_delay);
    if let Some(timeout) = &cfg.config.timeout {
        println!("  config.timeout = {timeout}");
    }
    println!();

    println!("steps ({}):", graph.len());
    for name in graph.topological_order() {
        let Some(step) = graph.step(name) else {
            continue;
        };
        let role = if step.critical {
            " [critical]"
        } else if step.report {
            " [report]"
        } else {
            ""
        };
        println!("  - {name}{role}");
        println!("      cmd: {}", step.cmd);
        if !step.after.is_empty() {
            println!("      after: {:?}", step.after);
        }
        if let Some(branch) = &step.branch {
            println!("      branch: {branch}");
        }
        println!(
            "      attempts: {} (delay {:?})",
            step.retry.max_attempts, step.retry.delay
        );
        if let Some(timeout) = step.retry.timeout {
            println!("      timeout: {timeout:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
