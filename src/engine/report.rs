// src/engine/report.rs

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::dag::StepResult;
use crate::engine::StepName;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RunStatus {
    /// Every branch step resolved and the report step (if any) ran.
    Done,
    /// The critical step failed; nothing else ran.
    Aborted { step: StepName, reason: String },
}

/// Outcome of one run: the only thing a caller consumes.
///
/// `total`, `succeeded` and `failed` count branch steps only. The critical
/// setup step and the report step are reported separately.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub setup: Option<Arc<StepResult>>,
    /// Branch step results in topological order.
    pub branches: Vec<Arc<StepResult>>,
    pub report: Option<Arc<StepResult>>,
}

impl RunReport {
    pub(crate) fn aborted(setup: Arc<StepResult>) -> Self {
        Self {
            status: RunStatus::Aborted {
                step: setup.name.clone(),
                reason: setup.message.clone(),
            },
            total: 0,
            succeeded: 0,
            failed: 0,
            setup: Some(setup),
            branches: Vec::new(),
            report: None,
        }
    }

    pub(crate) fn done(
        setup: Option<Arc<StepResult>>,
        branches: Vec<Arc<StepResult>>,
        report: Option<Arc<StepResult>>,
    ) -> Self {
        let succeeded = branches.iter().filter(|r| r.is_success()).count();
        Self {
            status: RunStatus::Done,
            total: branches.len(),
            succeeded,
            failed: branches.len() - succeeded,
            setup,
            branches,
            report,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, RunStatus::Aborted { .. })
    }

    /// Every result of the run: setup, branches, then report.
    pub fn results(&self) -> impl Iterator<Item = &Arc<StepResult>> {
        self.setup
            .iter()
            .chain(self.branches.iter())
            .chain(self.report.iter())
    }

    pub fn result_of(&self, step: &str) -> Option<&Arc<StepResult>> {
        self.results().find(|r| r.name == step)
    }

    /// Process exit code for this report: 0 clean, 1 with failures, 2 aborted.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Aborted { .. } => 2,
            RunStatus::Done => {
                let report_failed = self.report.as_ref().is_some_and(|r| !r.is_success());
                if self.failed > 0 || report_failed { 1 } else { 0 }
            }
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            RunStatus::Aborted { step, reason } => {
                writeln!(f, "run aborted: critical step '{step}' failed")?;
                writeln!(f, "  reason: {reason}")
            }
            RunStatus::Done => {
                writeln!(
                    f,
                    "run finished: {} steps, success {} / failed {}",
                    self.total, self.succeeded, self.failed
                )?;
                for result in self.results() {
                    writeln!(
                        f,
                        "  {:<8} {} ({} attempt{}, {:.1}s)",
                        result.outcome.to_string(),
                        result.name,
                        result.attempts,
                        if result.attempts == 1 { "" } else { "s" },
                        result.duration().as_secs_f64()
                    )?;
                }
                Ok(())
            }
        }
    }
}
