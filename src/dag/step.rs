// src/dag/step.rs

//! Step definitions and their terminal results.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::StepName;
use crate::exec::RetryPolicy;

/// Environment variable carrying a step's branch id into its command.
pub const BRANCH_ENV_VAR: &str = "NODE_ID";

/// Static description of one unit of work.
///
/// Built once from the pipeline definition and never mutated while a run is
/// in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub name: StepName,
    /// Command line handed to the [`StepExecutor`](crate::exec::StepExecutor).
    pub cmd: String,
    /// Branch / node this step belongs to, if any.
    pub branch: Option<String>,
    pub env: BTreeMap<String, String>,
    /// Direct dependencies (the `after = [...]` list).
    pub after: Vec<StepName>,
    /// A failing critical step aborts the run before any branch starts.
    pub critical: bool,
    /// The final reporting step, executed once after all branches resolved.
    pub report: bool,
    pub retry: RetryPolicy,
}

impl StepSpec {
    pub fn new(name: impl Into<StepName>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            branch: None,
            env: BTreeMap::new(),
            after: Vec::new(),
            critical: false,
            report: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn after(mut self, dep: impl Into<StepName>) -> Self {
        self.after.push(dep.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn report(mut self, report: bool) -> Self {
        self.report = report;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether this step takes part in the concurrent branch phase.
    pub fn is_branch_step(&self) -> bool {
        !self.critical && !self.report
    }

    /// Context handed to the executor: the step's env plus `NODE_ID` when a
    /// branch is set.
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut ctx = self.env.clone();
        if let Some(branch) = &self.branch {
            ctx.insert(BRANCH_ENV_VAR.to_string(), branch.clone());
        }
        ctx
    }
}

/// Terminal outcome of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Failed,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Success => f.write_str("success"),
            StepOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// The single terminal result of a step.
///
/// Produced once, after the step succeeded or exhausted its retries, and
/// shared as `Arc<StepResult>` from then on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub name: StepName,
    pub branch: Option<String>,
    pub outcome: StepOutcome,
    /// Output excerpt of the last attempt, or the reason it failed.
    pub message: String,
    /// Number of executor invocations; zero for skipped steps.
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    pub fn new(
        spec: &StepSpec,
        outcome: StepOutcome,
        message: impl Into<String>,
        attempts: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: spec.name.clone(),
            branch: spec.branch.clone(),
            outcome,
            message: message.into(),
            attempts,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Result for a step that never ran because `blocked_by` failed.
    pub fn skipped(spec: &StepSpec, blocked_by: &str) -> Self {
        let now = Utc::now();
        Self {
            name: spec.name.clone(),
            branch: spec.branch.clone(),
            outcome: StepOutcome::Failed,
            message: format!("skipped: dependency '{blocked_by}' failed"),
            attempts: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == StepOutcome::Success
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
