// src/exec/mod.rs

//! Step execution layer.
//!
//! - [`executor`] defines the [`StepExecutor`] trait the engine runs steps
//!   through, so tests can replace real processes with scripted ones.
//! - [`command`] is the production executor, running each step's `cmd`
//!   with `tokio::process::Command` and capturing its output.
//! - [`retry`] wraps an executor with a bounded [`RetryPolicy`] and turns
//!   every outcome into a [`StepResult`](crate::dag::StepResult).

pub mod command;
pub mod executor;
pub mod retry;

pub use command::CommandExecutor;
pub use executor::{ExecFuture, ExecOutput, StepExecutor};
pub use retry::{RetryPolicy, RetryingStep};
