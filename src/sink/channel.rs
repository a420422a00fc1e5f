use std::fmt;

use tokio::sync::mpsc;

use super::{StatusSink, StepStatus};

/// One event delivered through a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Step {
        step: String,
        status: StepStatus,
        message: String,
    },
    Log {
        step: String,
        line: String,
    },
    Aborted {
        step: String,
        reason: String,
    },
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusUpdate::Step {
                step,
                status,
                message,
            } => {
                if message.is_empty() {
                    write!(f, "[{status:>7}] {step}")
                } else {
                    write!(f, "[{status:>7}] {step}: {message}")
                }
            }
            StatusUpdate::Log { step, line } => write!(f, "          {step} | {line}"),
            StatusUpdate::Aborted { step, reason } => {
                write!(f, "[ ABORT ] {step}: {reason}")
            }
        }
    }
}

/// Sink that funnels every update into an unbounded channel.
///
/// All concurrent callers share one sender; the single receiver sees updates
/// in the order they were sent, so a consumer can render them without any
/// further locking. The channel closes once the sink is dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, update: StatusUpdate) {
        // A dropped receiver just means nobody is rendering anymore.
        let _ = self.tx.send(update);
    }
}

impl StatusSink for ChannelSink {
    fn on_step_update(&self, step: &str, status: StepStatus, message: &str) {
        self.send(StatusUpdate::Step {
            step: step.to_string(),
            status,
            message: message.to_string(),
        });
    }

    fn on_log_line(&self, step: &str, line: &str) {
        self.send(StatusUpdate::Log {
            step: step.to_string(),
            line: line.to_string(),
        });
    }

    fn on_abort(&self, step: &str, reason: &str) {
        self.send(StatusUpdate::Aborted {
            step: step.to_string(),
            reason: reason.to_string(),
        });
    }
}
