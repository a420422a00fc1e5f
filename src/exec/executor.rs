// src/exec/executor.rs

//! Pluggable step executor abstraction.
//!
//! The engine talks to a `StepExecutor` instead of spawning processes
//! itself. This makes it easy to swap in a scripted executor in tests while
//! keeping the production implementation in [`command`](super::command).

use std::future::Future;
use std::pin::Pin;

use crate::dag::StepSpec;

/// What one executor invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub success: bool,
    /// Captured output (or an excerpt of it).
    pub output: String,
}

impl ExecOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Boxed future returned by [`StepExecutor::run`].
///
/// An `Err` models a fault raised by the executor itself (the command could
/// not be spawned, a pipe broke, ...), as opposed to the work reporting
/// failure through `ExecOutput::success == false`. Both count as a failed
/// attempt.
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<ExecOutput>> + Send + 'a>>;

/// Trait abstracting how one attempt of a step is executed.
///
/// Production code uses [`CommandExecutor`](super::CommandExecutor); tests
/// provide implementations that don't spawn real processes. Implementations
/// are shared between concurrently running steps and must not assume any
/// ordering between calls.
pub trait StepExecutor: Send + Sync {
    /// Run one attempt of `step`, using `step.context()` as its context.
    fn run<'a>(&'a self, step: &'a StepSpec) -> ExecFuture<'a>;
}
