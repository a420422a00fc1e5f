// src/engine/pipeline.rs

use std::sync::Arc;

use anyhow::anyhow;

use tracing::{debug, error, info};

use crate::dag::{RunGraph, Scheduler};
use crate::engine::report::RunReport;
use crate::engine::runtime::Runtime;
use crate::engine::RunPhase;
use crate::errors::{Result, RundagError};
use crate::exec::{RetryingStep, StepExecutor};
use crate::sink::{StatusSink, StepStatus};
use crate::types::DependencyPolicy;

/// Orchestrates one end-to-end run.
///
/// ```text
/// Init -> SetupPending -> Aborted
///                      -> BranchesRunning -> ReportPending -> Done
/// ```
///
/// - The critical step (if defined) runs alone first. If it fails the run
///   is aborted: no branch step and no report step is ever submitted.
/// - All other steps except the report step are handed to the scheduler and
///   run concurrently, respecting their dependencies.
/// - Once every branch step has a terminal result the report step (if
///   defined) runs exactly once, whatever the branch outcomes were.
pub struct PipelineRunner {
    graph: Arc<RunGraph>,
    policy: DependencyPolicy,
    step_runner: RetryingStep,
    sink: Arc<dyn StatusSink>,
    phase: RunPhase,
}

impl PipelineRunner {
    pub fn new(
        graph: RunGraph,
        policy: DependencyPolicy,
        executor: Arc<dyn StepExecutor>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let step_runner = RetryingStep::new(executor, Arc::clone(&sink));
        Self {
            graph: Arc::new(graph),
            policy,
            step_runner,
            sink,
            phase: RunPhase::Init,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn advance(&mut self, next: RunPhase) {
        debug!(from = ?self.phase, to = ?next, "pipeline phase change");
        self.phase = next;
    }

    /// Execute the run. Only infrastructure errors are returned as `Err`;
    /// step failures, including a critical one, are part of the report.
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.phase != RunPhase::Init {
            return Err(RundagError::Other(anyhow!(
                "a pipeline runner can only be run once (phase {:?})",
                self.phase
            )));
        }

        info!(steps = self.graph.len(), policy = %self.policy, "pipeline run started");
        for spec in self.graph.steps() {
            self.sink
                .on_step_update(&spec.name, StepStatus::Pending, "");
        }
        self.advance(RunPhase::SetupPending);

        let setup = match self.graph.critical_step() {
            Some(spec) => {
                let result = Arc::new(self.step_runner.execute(spec).await);
                if !result.is_success() {
                    error!(
                        step = %result.name,
                        reason = %result.message,
                        "critical step failed; aborting pipeline"
                    );
                    self.sink.on_abort(&result.name, &result.message);
                    self.advance(RunPhase::Aborted);
                    return Ok(RunReport::aborted(result));
                }
                Some(result)
            }
            None => None,
        };

        self.advance(RunPhase::BranchesRunning);
        let mut scheduler = Scheduler::new(Arc::clone(&self.graph), self.policy);
        if let Some(result) = &setup {
            scheduler.mark_resolved(&result.name, result.outcome);
        }
        let branch_steps: Vec<String> = self
            .graph
            .branch_steps()
            .map(|s| s.name.clone())
            .collect();
        let runtime = Runtime::new(
            Arc::clone(&self.graph),
            scheduler,
            self.step_runner.clone(),
            Arc::clone(&self.sink),
        );
        let state = runtime.run(&branch_steps).await?;

        self.advance(RunPhase::ReportPending);
        info!(
            succeeded = state.succeeded(),
            failed = state.failed(),
            "all branches resolved"
        );
        let branches = state.into_results(
            self.graph
                .topological_order()
                .iter()
                .map(|s| s.as_str()),
        );

        let report = match self.graph.report_step() {
            Some(spec) => Some(Arc::new(self.step_runner.execute(spec).await)),
            None => None,
        };

        self.advance(RunPhase::Done);
        let run_report = RunReport::done(setup, branches, report);
        info!(
            total = run_report.total,
            succeeded = run_report.succeeded,
            failed = run_report.failed,
            "pipeline run finished"
        );
        Ok(run_report)
    }
}
