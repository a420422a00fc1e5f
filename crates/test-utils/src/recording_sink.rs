use std::sync::Mutex;

use rundag::sink::{StatusSink, StepStatus};

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Update {
        step: String,
        status: StepStatus,
        message: String,
    },
    Log {
        step: String,
        line: String,
    },
    Abort {
        step: String,
        reason: String,
    },
}

/// Sink that records every call, for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Statuses reported for `step`, in order.
    pub fn statuses_of(&self, step: &str) -> Vec<StepStatus> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Update { step: s, status, .. } if s == step => Some(*status),
                _ => None,
            })
            .collect()
    }

    pub fn aborts(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Abort { step, reason } => Some((step.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn on_step_update(&self, step: &str, status: StepStatus, message: &str) {
        self.events.lock().unwrap().push(SinkEvent::Update {
            step: step.to_string(),
            status,
            message: message.to_string(),
        });
    }

    fn on_log_line(&self, step: &str, line: &str) {
        self.events.lock().unwrap().push(SinkEvent::Log {
            step: step.to_string(),
            line: line.to_string(),
        });
    }

    fn on_abort(&self, step: &str, reason: &str) {
        self.events.lock().unwrap().push(SinkEvent::Abort {
            step: step.to_string(),
            reason: reason.to_string(),
        });
    }
}
