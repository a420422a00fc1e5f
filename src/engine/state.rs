// src/engine/state.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::dag::StepResult;
use crate::engine::StepName;

/// Mutable state of one run.
///
/// Owned by the [`Runtime`](super::Runtime) driver loop, which is the only
/// writer: step tasks hand their results back through their join handles
/// instead of touching this directly.
#[derive(Debug, Default)]
pub struct RunState {
    results: HashMap<StepName, Arc<StepResult>>,
    in_flight: HashSet<StepName>,
    succeeded: usize,
    failed: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_in_flight(&mut self, step: &str) {
        self.in_flight.insert(step.to_string());
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Store the terminal result of a step.
    ///
    /// Returns `false` and keeps the first result if the step already had
    /// one.
    pub fn record(&mut self, result: Arc<StepResult>) -> bool {
        if self.results.contains_key(&result.name) {
            return false;
        }
        self.in_flight.remove(&result.name);
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.insert(result.name.clone(), result);
        true
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn resolved(&self) -> usize {
        self.results.len()
    }

    /// Consume the state, returning results ordered by `order`. Names with
    /// no result are left out.
    pub fn into_results<'a, I>(mut self, order: I) -> Vec<Arc<StepResult>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        order
            .into_iter()
            .filter_map(|name| self.results.remove(name))
            .collect()
    }
}
