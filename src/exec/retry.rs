// src/exec/retry.rs

//! Bounded retry around a single step.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::dag::{StepOutcome, StepResult, StepSpec};
use crate::exec::executor::{ExecOutput, StepExecutor};
use crate::sink::{StatusSink, StepStatus};

/// Fixed-count, fixed-delay retry policy of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Pause between two attempts.
    pub delay: Duration,
    /// Deadline for a single attempt; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            timeout: None,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for RetryPolicy {
    /// One attempt plus two retries, five seconds apart.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Runs a step through a [`StepExecutor`] under the step's [`RetryPolicy`].
///
/// Failures never escape as errors: a failed report, an executor fault and a
/// timed-out attempt are all retried, and running out of attempts produces a
/// `Failed` [`StepResult`] carrying the last attempt's message.
#[derive(Clone)]
pub struct RetryingStep {
    executor: Arc<dyn StepExecutor>,
    sink: Arc<dyn StatusSink>,
}

impl RetryingStep {
    pub fn new(executor: Arc<dyn StepExecutor>, sink: Arc<dyn StatusSink>) -> Self {
        Self { executor, sink }
    }

    pub async fn execute(&self, step: &StepSpec) -> StepResult {
        let policy = step.retry;
        let started_at = Utc::now();
        let mut attempt = 0;

        let last_message = loop {
            attempt += 1;
            self.sink.on_step_update(
                &step.name,
                StepStatus::Running,
                &format!("attempt {attempt}/{}", policy.max_attempts),
            );
            info!(
                step = %step.name,
                attempt,
                max_attempts = policy.max_attempts,
                "starting attempt"
            );

            let message = match self.attempt(step, policy.timeout).await {
                Ok(output) if output.success => {
                    let message = success_message(&output);
                    self.sink
                        .on_step_update(&step.name, StepStatus::Success, &message);
                    info!(step = %step.name, attempt, "step succeeded");
                    return StepResult::new(step, StepOutcome::Success, message, attempt, started_at);
                }
                Ok(output) => failure_message(&output),
                Err(reason) => reason,
            };

            if attempt >= policy.max_attempts {
                break message;
            }

            warn!(
                step = %step.name,
                attempt,
                delay = ?policy.delay,
                reason = %message,
                "attempt failed; retrying"
            );
            tokio::time::sleep(policy.delay).await;
        };

        warn!(
            step = %step.name,
            attempts = attempt,
            reason = %last_message,
            "step failed after exhausting retries"
        );
        self.sink
            .on_step_update(&step.name, StepStatus::Failed, &last_message);
        StepResult::new(step, StepOutcome::Failed, last_message, attempt, started_at)
    }

    /// One executor invocation; every kind of failure comes back as `Err`
    /// text except a non-successful output, which the caller inspects.
    async fn attempt(
        &self,
        step: &StepSpec,
        timeout: Option<Duration>,
    ) -> Result<ExecOutput, String> {
        let run = self.executor.run(step);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => return Err(format!("timed out after {limit:?}")),
            },
            None => run.await,
        };
        result.map_err(|e| format!("executor error: {e:#}"))
    }
}

fn success_message(output: &ExecOutput) -> String {
    let trimmed = output.output.trim();
    if trimmed.is_empty() {
        "completed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn failure_message(output: &ExecOutput) -> String {
    let trimmed = output.output.trim();
    if trimmed.is_empty() {
        "step reported failure".to_string()
    } else {
        trimmed.to_string()
    }
}
