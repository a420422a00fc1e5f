// src/engine/mod.rs

//! Orchestration engine for rundag.
//!
//! This module ties together:
//! - the pure DAG scheduler (in [`crate::dag`])
//! - the async runtime that executes ready steps concurrently ([`runtime`])
//! - the pipeline state machine around one run ([`pipeline`])
//! - per-run state and the final report ([`state`], [`report`])

/// Canonical step name type used throughout the engine.
pub type StepName = String;

/// Phase of a [`PipelineRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    /// The critical step is running.
    SetupPending,
    /// The critical step failed; terminal.
    Aborted,
    /// Branch steps are running concurrently.
    BranchesRunning,
    /// Every branch step resolved; the report step is running.
    ReportPending,
    /// Terminal.
    Done,
}

pub mod pipeline;
pub mod report;
pub mod runtime;
pub mod state;

pub use pipeline::PipelineRunner;
pub use report::{RunReport, RunStatus};
pub use runtime::Runtime;
pub use state::RunState;
