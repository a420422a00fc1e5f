// src/sink/mod.rs

//! Status reporting.
//!
//! The engine never renders anything itself. Every step update is pushed
//! into a [`StatusSink`] handed to it at construction time, and the sink
//! decides what to do with it:
//!
//! - [`LogSink`] forwards updates to `tracing`.
//! - [`ChannelSink`] funnels updates into a single-consumer channel, used by
//!   the CLI to print a status stream.
//! - [`StatusBoard`] keeps the latest status of every step in memory.
//! - [`MultiSink`] fans updates out to several sinks.
//!
//! Sinks are called from many concurrently running steps, so every
//! implementation must serialize internally.

pub mod board;
pub mod channel;
pub mod log;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use board::{BoardEntry, StatusBoard};
pub use channel::{ChannelSink, StatusUpdate};
pub use log::LogSink;

/// Status of a step as seen by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Running => "RUNNING",
            StepStatus::Success => "SUCCESS",
            StepStatus::Failed => "FAILED",
        };
        f.pad(s)
    }
}

/// Receiver of step updates.
pub trait StatusSink: Send + Sync {
    /// Called at least when a step starts an attempt and when it resolves.
    fn on_step_update(&self, step: &str, status: StepStatus, message: &str);

    /// One line of live output from a running step.
    fn on_log_line(&self, _step: &str, _line: &str) {}

    /// The critical step failed and the run is being aborted.
    fn on_abort(&self, _step: &str, _reason: &str) {}
}

/// Sink that forwards everything to several sinks in order.
#[derive(Default, Clone)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn StatusSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn StatusSink>) {
        self.sinks.push(sink);
    }
}

impl StatusSink for MultiSink {
    fn on_step_update(&self, step: &str, status: StepStatus, message: &str) {
        for sink in &self.sinks {
            sink.on_step_update(step, status, message);
        }
    }

    fn on_log_line(&self, step: &str, line: &str) {
        for sink in &self.sinks {
            sink.on_log_line(step, line);
        }
    }

    fn on_abort(&self, step: &str, reason: &str) {
        for sink in &self.sinks {
            sink.on_abort(step, reason);
        }
    }
}
