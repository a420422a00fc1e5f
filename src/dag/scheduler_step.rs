// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::step_info::SkippedStep;
use crate::engine::StepName;

/// Structured result of a single scheduler "step".
///
/// Returned from every state transition so the driver knows what to submit
/// next, and so tests can manually step the DAG and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Steps whose dependencies are now satisfied; the caller must submit
    /// them for execution.
    pub newly_scheduled: Vec<StepName>,
    /// Steps resolved as failed without running, because a dependency failed
    /// under the `succeeded` dependency policy.
    pub newly_skipped: Vec<SkippedStep>,
    /// Whether this step left no participating step pending or running.
    pub run_just_finished: bool,
}
