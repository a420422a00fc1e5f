use tracing::{debug, error, info, warn};

use super::{StatusSink, StepStatus};

/// Sink that turns step updates into `tracing` events.
///
/// Live output lines are logged at debug level, so they only show up with
/// `--log-level debug` or `RUNDAG_LOG=debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn on_step_update(&self, step: &str, status: StepStatus, message: &str) {
        match status {
            StepStatus::Failed => warn!(step = %step, %status, "{}", message),
            _ => info!(step = %step, %status, "{}", message),
        }
    }

    fn on_log_line(&self, step: &str, line: &str) {
        debug!(step = %step, "{}", line);
    }

    fn on_abort(&self, step: &str, reason: &str) {
        error!(step = %step, reason = %reason, "critical step failed; aborting run");
    }
}
