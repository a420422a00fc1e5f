use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rundag::dag::StepSpec;
use rundag::exec::{ExecFuture, ExecOutput, StepExecutor};

/// How a scripted step behaves on each attempt.
#[derive(Debug, Clone, Copy)]
enum Script {
    /// Fail this many attempts, then succeed.
    FailTimes(u32),
    /// Return an executor error on every attempt.
    Fault,
    /// Never finish.
    Hang,
}

/// One executor invocation as observed by [`ScriptedExecutor`].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub step: String,
    pub attempt: u32,
    pub context: BTreeMap<String, String>,
    pub started: Instant,
    /// `None` while the attempt is still running (or was dropped).
    pub finished: Option<Instant>,
}

/// A fake executor that:
/// - records every invocation with its context and timing
/// - sleeps for a configurable per-step delay
/// - succeeds, fails a number of times, faults, or hangs, per step.
///
/// Steps without a script succeed after the default delay.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn delay(mut self, step: &str, delay: Duration) -> Self {
        self.delays.insert(step.to_string(), delay);
        self
    }

    pub fn always_fail(self, step: &str) -> Self {
        self.fail_times(step, u32::MAX)
    }

    pub fn fail_times(mut self, step: &str, times: u32) -> Self {
        self.scripts.insert(step.to_string(), Script::FailTimes(times));
        self
    }

    pub fn fault(mut self, step: &str) -> Self {
        self.scripts.insert(step.to_string(), Script::Fault);
        self
    }

    pub fn hang(mut self, step: &str) -> Self {
        self.scripts.insert(step.to_string(), Script::Hang);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every invocation so far, in start order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of attempts made for `step`.
    pub fn attempts(&self, step: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.step == step)
            .count()
    }

    /// Distinct steps invoked, in first-start order.
    pub fn invoked_steps(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for inv in self.invocations.lock().unwrap().iter() {
            if !seen.contains(&inv.step) {
                seen.push(inv.step.clone());
            }
        }
        seen
    }

    pub fn first_start(&self, step: &str) -> Option<Instant> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.step == step)
            .map(|i| i.started)
    }

    pub fn last_finish(&self, step: &str) -> Option<Instant> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.step == step)
            .filter_map(|i| i.finished)
            .max()
    }

    fn start(&self, step: &StepSpec) -> (usize, u32) {
        let mut guard = self.invocations.lock().unwrap();
        let attempt = guard.iter().filter(|i| i.step == step.name).count() as u32 + 1;
        guard.push(Invocation {
            step: step.name.clone(),
            attempt,
            context: step.context(),
            started: Instant::now(),
            finished: None,
        });
        (guard.len() - 1, attempt)
    }

    fn finish(&self, index: usize) {
        if let Some(inv) = self.invocations.lock().unwrap().get_mut(index) {
            inv.finished = Some(Instant::now());
        }
    }
}

impl StepExecutor for ScriptedExecutor {
    fn run<'a>(&'a self, step: &'a StepSpec) -> ExecFuture<'a> {
        Box::pin(async move {
            let (index, attempt) = self.start(step);
            let delay = self
                .delays
                .get(&step.name)
                .copied()
                .unwrap_or(self.default_delay);
            let script = self.scripts.get(&step.name).copied();

            if matches!(script, Some(Script::Hang)) {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(delay).await;
            self.finish(index);

            match script {
                Some(Script::Fault) => Err(anyhow::anyhow!("{} exploded", step.name)),
                Some(Script::FailTimes(times)) if attempt <= times => Ok(ExecOutput::failure(
                    format!("{} failed on attempt {attempt}", step.name),
                )),
                _ => Ok(ExecOutput::success(format!("{} ok", step.name))),
            }
        })
    }
}
