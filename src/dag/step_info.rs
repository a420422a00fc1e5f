// src/dag/step_info.rs

//! Per-run scheduling state of each step.

use crate::dag::StepOutcome;
use crate::engine::StepName;

/// Per-run state of a step (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Step is part of the run but is waiting on dependencies.
    Pending,
    /// Step has been submitted for execution.
    Running,
    /// Step has a successful terminal result.
    DoneSuccess,
    /// Step failed, or was skipped because a dependency failed.
    DoneFailed,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::DoneSuccess | StepState::DoneFailed)
    }
}

impl From<StepOutcome> for StepState {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Success => StepState::DoneSuccess,
            StepOutcome::Failed => StepState::DoneFailed,
        }
    }
}

/// Public, read-only view of a step's per-run state.
///
/// This is exposed for tests and diagnostics without leaking the internal
/// `StepState` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRunState {
    /// The step is not participating in this run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<StepState>> for StepRunState {
    fn from(state: Option<StepState>) -> Self {
        match state {
            None => StepRunState::NotInRun,
            Some(StepState::Pending) => StepRunState::Pending,
            Some(StepState::Running) => StepRunState::Running,
            Some(StepState::DoneSuccess) => StepRunState::DoneSuccess,
            Some(StepState::DoneFailed) => StepRunState::DoneFailed,
        }
    }
}

/// Scheduling view of one step: its dependencies and where it is in the run.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub name: StepName,
    /// Direct dependencies for this step (names in `after = [...]`).
    pub deps: Vec<StepName>,
    /// Per-run state (None if not participating in the run).
    pub run_state: Option<StepState>,
}

impl StepInfo {
    pub fn new(name: StepName, deps: Vec<StepName>) -> Self {
        Self {
            name,
            deps,
            run_state: None,
        }
    }
}

/// A step skipped because one of its dependencies failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStep {
    pub name: StepName,
    /// The failed dependency that blocked it.
    pub blocked_by: StepName,
}
