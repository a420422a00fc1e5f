use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::RunGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::step_info::{StepState, StepInfo, StepRunState};
use crate::dag::StepOutcome;
use crate::engine::StepName;
use crate::types::DependencyPolicy;

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is a pure, synchronous state machine: it never executes anything. It
/// is responsible for:
/// - remembering which steps are part of the run
/// - deciding when a step is "ready" (dependencies satisfy the policy)
/// - marking steps as succeeded/failed
/// - releasing dependents when appropriate
/// - skipping dependents of failed steps under the `succeeded` policy
///
/// The async driver in [`crate::engine::runtime`] feeds it completions and
/// submits whatever it returns in [`SchedulerStep::newly_scheduled`].
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<RunGraph>,
    steps: HashMap<StepName, StepInfo>,
    policy: DependencyPolicy,
}

impl Scheduler {
    pub fn new(graph: Arc<RunGraph>, policy: DependencyPolicy) -> Self {
        let steps = graph
            .steps()
            .map(|spec| {
                (
                    spec.name.clone(),
                    StepInfo::new(spec.name.clone(), spec.after.clone()),
                )
            })
            .collect();

        Self {
            graph,
            steps,
            policy,
        }
    }

    /// Read-only view of the given step's run state.
    pub fn run_state_of(&self, step: &str) -> Option<StepRunState> {
        let info = self.steps.get(step)?;
        Some(info.run_state.into())
    }

    /// Steps in the run that are still pending or running, sorted by name.
    pub fn unresolved_steps(&self) -> Vec<StepName> {
        let mut names: Vec<StepName> = self
            .steps
            .values()
            .filter(|info| info.run_state.is_some_and(|s| !s.is_terminal()))
            .map(|info| info.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Whether the dependencies of `step` are satisfied right now.
    ///
    /// Returns `None` if the step is unknown.
    pub fn deps_satisfied(&self, step: &str) -> Option<bool> {
        let info = self.steps.get(step)?;
        let mgr = ReadOnlyStateManager::new(&self.steps, self.policy);
        Some(mgr.deps_satisfied_for_info(info))
    }

    /// `true` once no participating step is pending or running.
    pub fn is_finished(&self) -> bool {
        self.steps
            .values()
            .all(|info| info.run_state.is_none_or(StepState::is_terminal))
    }

    /// Record a step that was executed outside the scheduler (the critical
    /// setup step) so its dependents can rely on it.
    pub fn mark_resolved(&mut self, step: &str, outcome: StepOutcome) {
        match self.steps.get_mut(step) {
            Some(info) => {
                debug!(step = %info.name, %outcome, "step resolved outside the scheduler");
                info.run_state = Some(outcome.into());
            }
            None => warn!(step = %step, "resolution for unknown step; ignoring"),
        }
    }

    /// Add the given steps to the run and return those that can start now.
    pub fn begin<I, S>(&mut self, steps: I) -> SchedulerStep
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut manager = StateManager::new(&self.graph, &mut self.steps, self.policy);
        for step in steps {
            manager.mark_pending(step.as_ref());
        }

        // Failures recorded before the run began still block their
        // dependents under the `succeeded` policy.
        let already_failed: Vec<StepName> = self
            .steps
            .values()
            .filter(|info| info.run_state == Some(StepState::DoneFailed))
            .map(|info| info.name.clone())
            .collect();

        let mut manager = StateManager::new(&self.graph, &mut self.steps, self.policy);
        let mut newly_skipped = Vec::new();
        for failed in already_failed {
            newly_skipped.extend(manager.skip_dependents_of(&failed));
        }
        let newly_scheduled = manager.collect_new_ready_steps();
        let run_just_finished = manager.all_steps_terminal();

        info!(
            scheduled = newly_scheduled.len(),
            skipped = newly_skipped.len(),
            policy = %self.policy,
            "scheduler: run started"
        );

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_just_finished,
        }
    }

    /// Handle the terminal outcome of a submitted step.
    pub fn handle_completion(&mut self, step: &str, outcome: StepOutcome) -> SchedulerStep {
        let Some(info) = self.steps.get_mut(step) else {
            warn!(step = %step, "completion for unknown step; ignoring");
            return SchedulerStep::default();
        };

        if info.run_state != Some(StepState::Running) {
            warn!(
                step = %step,
                state = ?info.run_state,
                "completion for a step that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        info.run_state = Some(outcome.into());

        let mut manager = StateManager::new(&self.graph, &mut self.steps, self.policy);
        let newly_skipped = match outcome {
            StepOutcome::Success => {
                debug!(step = %step, "step completed successfully");
                Vec::new()
            }
            StepOutcome::Failed => {
                warn!(step = %step, policy = %self.policy, "step failed");
                manager.skip_dependents_of(step)
            }
        };
        let newly_scheduled = manager.collect_new_ready_steps();
        let run_just_finished = manager.all_steps_terminal();

        if run_just_finished {
            info!("scheduler: all steps terminal; run finished");
        }

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_just_finished,
        }
    }
}
