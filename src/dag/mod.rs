// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the validated, immutable [`RunGraph`] of one run.
//! - [`step`] defines [`StepSpec`] and the terminal [`StepResult`].
//! - [`scheduler`] contains the per-run state machine that decides
//!   which steps are ready to run, and when dependents can be released.
//! - [`step_info`] provides per-run step state types.
//! - [`scheduler_step`] defines the result type for scheduler transitions.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod step;
pub mod step_info;

pub use graph::RunGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use step::{BRANCH_ENV_VAR, StepOutcome, StepResult, StepSpec};
pub use step_info::{SkippedStep, StepRunState};
