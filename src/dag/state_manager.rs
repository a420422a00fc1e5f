// src/dag/state_manager.rs

//! Per-run state transitions for steps in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::RunGraph;
use crate::dag::step_info::{StepState, SkippedStep, StepInfo};
use crate::engine::StepName;
use crate::types::DependencyPolicy;

/// Manages per-run state transitions for steps.
pub struct StateManager<'a> {
    graph: &'a RunGraph,
    steps: &'a mut HashMap<StepName, StepInfo>,
    policy: DependencyPolicy,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a RunGraph,
        steps: &'a mut HashMap<StepName, StepInfo>,
        policy: DependencyPolicy,
    ) -> Self {
        Self {
            graph,
            steps,
            policy,
        }
    }

    /// Include a step in the run as `Pending`.
    ///
    /// Steps that already have a state (resolved up front, or included twice)
    /// keep it.
    pub fn mark_pending(&mut self, name: &str) {
        match self.steps.get_mut(name) {
            Some(info) if info.run_state.is_none() => {
                info.run_state = Some(StepState::Pending);
                debug!(step = %info.name, "marked Pending for this run");
            }
            Some(_) => {}
            None => warn!(step = %name, "asked to include unknown step in run; ignoring"),
        }
    }

    /// Whether all dependencies of the given step satisfy the policy.
    pub fn deps_satisfied_for_info(&self, info: &StepInfo) -> bool {
        ReadOnlyStateManager::new(self.steps, self.policy).deps_satisfied_for_info(info)
    }

    /// Under [`DependencyPolicy::Succeeded`], resolve every pending dependent
    /// of `failed_step` (transitively) as failed without running it.
    ///
    /// Under [`DependencyPolicy::Resolved`] a failure blocks nothing and this
    /// returns an empty list.
    pub fn skip_dependents_of(&mut self, failed_step: &str) -> Vec<SkippedStep> {
        if self.policy == DependencyPolicy::Resolved {
            return Vec::new();
        }

        let mut stack: Vec<(StepName, StepName)> = self
            .graph
            .dependents_of(failed_step)
            .iter()
            .map(|d| (d.clone(), failed_step.to_string()))
            .collect();

        let mut skipped = Vec::new();

        while let Some((name, blocked_by)) = stack.pop() {
            let Some(info) = self.steps.get_mut(&name) else {
                continue;
            };
            if info.run_state != Some(StepState::Pending) {
                // Terminal already, running, or not in this run.
                continue;
            }

            info.run_state = Some(StepState::DoneFailed);
            debug!(
                step = %info.name,
                blocked_by = %blocked_by,
                "skipping dependent of failed step"
            );
            stack.extend(
                self.graph
                    .dependents_of(&name)
                    .iter()
                    .map(|d| (d.clone(), name.clone())),
            );
            skipped.push(SkippedStep { name, blocked_by });
        }

        skipped
    }

    /// Collect steps that are `Pending` and whose dependencies are satisfied,
    /// mark them as `Running`, and return their names.
    ///
    /// Candidates are returned in topological order so submission is
    /// deterministic for a given state.
    pub fn collect_new_ready_steps(&mut self) -> Vec<StepName> {
        // Decide first, then mutate to avoid borrowing issues.
        let candidates: Vec<StepName> = self
            .graph
            .topological_order()
            .iter()
            .filter(|name| {
                self.steps.get(name.as_str()).is_some_and(|info| {
                    info.run_state == Some(StepState::Pending) && self.deps_satisfied_for_info(info)
                })
            })
            .cloned()
            .collect();

        for name in &candidates {
            if let Some(info) = self.steps.get_mut(name) {
                info!(step = %info.name, "dependencies satisfied; submitting step");
                info.run_state = Some(StepState::Running);
            }
        }

        candidates
    }

    /// Check if every participating step is in a terminal state.
    pub fn all_steps_terminal(&self) -> bool {
        self.steps
            .values()
            .all(|info| info.run_state.is_none_or(StepState::is_terminal))
    }
}

/// A read-only view of the state manager for checking dependency satisfaction.
///
/// This is used when we only have shared access to the steps map (e.g. in
/// `Scheduler::deps_satisfied`).
pub struct ReadOnlyStateManager<'a> {
    steps: &'a HashMap<StepName, StepInfo>,
    policy: DependencyPolicy,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(steps: &'a HashMap<StepName, StepInfo>, policy: DependencyPolicy) -> Self {
        Self { steps, policy }
    }

    /// Canonical dependency satisfaction check.
    ///
    /// - `Resolved`: every dependency is `DoneSuccess` or `DoneFailed`.
    /// - `Succeeded`: every dependency is `DoneSuccess`.
    ///
    /// A dependency that is not part of the run never satisfies.
    pub fn deps_satisfied_for_info(&self, info: &StepInfo) -> bool {
        info.deps.iter().all(|dep_name| {
            let Some(dep) = self.steps.get(dep_name) else {
                warn!(
                    step = %info.name,
                    dep = %dep_name,
                    "dependency missing from steps map"
                );
                return false;
            };

            match (dep.run_state, self.policy) {
                (Some(StepState::DoneSuccess), _) => true,
                (Some(StepState::DoneFailed), DependencyPolicy::Resolved) => true,
                (Some(StepState::DoneFailed), DependencyPolicy::Succeeded) => false,
                (Some(StepState::Pending) | Some(StepState::Running), _) => false,
                (None, _) => false,
            }
        })
    }
}
