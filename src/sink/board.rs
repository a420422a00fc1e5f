use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::{StatusSink, StepStatus};

/// Number of recent log lines kept by a [`StatusBoard`].
pub const RECENT_LOG_LINES: usize = 30;

/// Latest known state of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEntry {
    pub status: StepStatus,
    pub message: String,
}

#[derive(Debug, Default)]
struct BoardState {
    entries: BTreeMap<String, BoardEntry>,
    recent_logs: VecDeque<String>,
    aborted: Option<(String, String)>,
}

/// In-memory table of the latest status and message per step, plus a short
/// rolling window of recent log lines.
///
/// Created per run and passed into the engine as a sink; a renderer can
/// poll [`snapshot`](Self::snapshot) at any time.
#[derive(Debug, Default)]
pub struct StatusBoard {
    state: Mutex<BoardState>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        // Display data only, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ordered copy of every step's latest entry.
    pub fn snapshot(&self) -> BTreeMap<String, BoardEntry> {
        self.lock().entries.clone()
    }

    pub fn status_of(&self, step: &str) -> Option<StepStatus> {
        self.lock().entries.get(step).map(|e| e.status)
    }

    /// The most recent log lines, oldest first.
    pub fn recent_logs(&self) -> Vec<String> {
        self.lock().recent_logs.iter().cloned().collect()
    }

    /// The failed critical step and the reason, if the run was aborted.
    pub fn aborted(&self) -> Option<(String, String)> {
        self.lock().aborted.clone()
    }
}

impl StatusSink for StatusBoard {
    fn on_step_update(&self, step: &str, status: StepStatus, message: &str) {
        self.lock().entries.insert(
            step.to_string(),
            BoardEntry {
                status,
                message: message.to_string(),
            },
        );
    }

    fn on_log_line(&self, step: &str, line: &str) {
        let mut state = self.lock();
        if state.recent_logs.len() == RECENT_LOG_LINES {
            state.recent_logs.pop_front();
        }
        state.recent_logs.push_back(format!("[{step}] {line}"));
    }

    fn on_abort(&self, step: &str, reason: &str) {
        self.lock().aborted = Some((step.to_string(), reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_latest_status_per_step() {
        let board = StatusBoard::new();
        board.on_step_update("b", StepStatus::Pending, "");
        board.on_step_update("a", StepStatus::Running, "attempt 1/3");
        board.on_step_update("a", StepStatus::Success, "done");

        let snapshot = board.snapshot();
        let names: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(snapshot["a"].status, StepStatus::Success);
        assert_eq!(snapshot["a"].message, "done");
        assert_eq!(board.status_of("b"), Some(StepStatus::Pending));
    }

    #[test]
    fn log_window_is_bounded() {
        let board = StatusBoard::new();
        for i in 0..(RECENT_LOG_LINES + 5) {
            board.on_log_line("a", &format!("line {i}"));
        }
        let logs = board.recent_logs();
        assert_eq!(logs.len(), RECENT_LOG_LINES);
        assert_eq!(logs[0], "[a] line 5");
    }
}
