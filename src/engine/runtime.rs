// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::{RunGraph, Scheduler, SchedulerStep, StepOutcome, StepResult};
use crate::engine::StepName;
use crate::engine::state::RunState;
use crate::errors::{Result, RundagError};
use crate::exec::RetryingStep;
use crate::sink::{StatusSink, StepStatus};

/// Drives the pure [`Scheduler`] for the concurrent branch phase.
///
/// Every ready step is spawned as its own tokio task in a `JoinSet`, tracked
/// by task id so a panicking step can still be attributed. Completions are
/// consumed one at a time by this loop, which is the only writer of the
/// [`RunState`]. The loop ends when the scheduler has nothing running and
/// nothing left to release.
pub struct Runtime {
    graph: Arc<RunGraph>,
    scheduler: Scheduler,
    step_runner: RetryingStep,
    sink: Arc<dyn StatusSink>,
    state: RunState,
    tasks: JoinSet<StepResult>,
    task_names: HashMap<Id, StepName>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        graph: Arc<RunGraph>,
        scheduler: Scheduler,
        step_runner: RetryingStep,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            graph,
            scheduler,
            step_runner,
            sink,
            state: RunState::new(),
            tasks: JoinSet::new(),
            task_names: HashMap::new(),
        }
    }

    /// Run `steps` to completion and return their results.
    pub async fn run<I, S>(mut self, steps: I) -> Result<RunState>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        info!("branch runtime started");

        let step = self.scheduler.begin(steps);
        self.apply(step)?;

        while let Some(joined) = self.tasks.join_next_with_id().await {
            let result = match joined {
                Ok((id, result)) => {
                    self.task_names.remove(&id);
                    Arc::new(result)
                }
                Err(err) => self.result_for_crashed_task(err)?,
            };

            debug!(
                step = %result.name,
                outcome = %result.outcome,
                in_flight = self.state.in_flight_count(),
                "runtime received step result"
            );

            let name = result.name.clone();
            let outcome = result.outcome;
            if !self.state.record(result) {
                warn!(step = %name, "step resolved twice; keeping the first result");
                continue;
            }

            let step = self.scheduler.handle_completion(&name, outcome);
            self.apply(step)?;
        }

        if !self.scheduler.is_finished() {
            return Err(RundagError::Other(anyhow!(
                "scheduler stalled after {} results; unresolved steps: {:?}",
                self.state.resolved(),
                self.scheduler.unresolved_steps()
            )));
        }

        info!(
            succeeded = self.state.succeeded(),
            failed = self.state.failed(),
            "branch runtime finished"
        );
        Ok(self.state)
    }

    /// Record skipped steps and submit newly ready ones.
    fn apply(&mut self, step: SchedulerStep) -> Result<()> {
        for skipped in step.newly_skipped {
            let spec = self.graph.get(&skipped.name)?;
            let result = StepResult::skipped(spec, &skipped.blocked_by);
            self.sink
                .on_step_update(&result.name, StepStatus::Failed, &result.message);
            self.state.record(Arc::new(result));
        }

        if !step.newly_scheduled.is_empty() {
            debug!(steps = ?step.newly_scheduled, "submitting ready steps");
        }
        for name in step.newly_scheduled {
            self.submit(name)?;
        }
        Ok(())
    }

    fn submit(&mut self, name: StepName) -> Result<()> {
        let spec = self.graph.get(&name)?.clone();
        let runner = self.step_runner.clone();

        self.state.mark_in_flight(&name);
        let handle = self.tasks.spawn(async move { runner.execute(&spec).await });
        self.task_names.insert(handle.id(), name);
        Ok(())
    }

    /// A step task panicked or was aborted. Turn it into a failed result so
    /// the rest of the run carries on.
    fn result_for_crashed_task(&mut self, err: tokio::task::JoinError) -> Result<Arc<StepResult>> {
        let name = self.task_names.remove(&err.id()).ok_or_else(|| {
            RundagError::Other(anyhow!("join error for untracked step task: {err}"))
        })?;
        let spec = self.graph.get(&name)?;

        let message = format!("step task crashed: {err}");
        error!(step = %name, error = %err, "step task crashed");
        self.sink
            .on_step_update(&name, StepStatus::Failed, &message);

        Ok(Arc::new(StepResult::new(
            spec,
            StepOutcome::Failed,
            message,
            0,
            Utc::now(),
        )))
    }
}
