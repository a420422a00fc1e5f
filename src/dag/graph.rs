// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::StepSpec;
use crate::engine::StepName;
use crate::errors::{Result, RundagError};

/// Static DAG of one pipeline run.
///
/// Holds the step specs in definition order plus the derived adjacency
/// (dependents per step). Construction validates the graph, so a `RunGraph`
/// in hand is always acyclic, closed over its dependency names, and has at
/// most one critical and one report step.
#[derive(Debug, Clone)]
pub struct RunGraph {
    specs: Vec<StepSpec>,
    index: HashMap<StepName, usize>,
    dependents: HashMap<StepName, Vec<StepName>>,
    topo_order: Vec<StepName>,
}

impl RunGraph {
    pub fn new(specs: Vec<StepSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(RundagError::ConfigError(format!(
                    "step '{}' is defined more than once",
                    spec.name
                )));
            }
        }

        validate_dependencies(&specs, &index)?;
        validate_roles(&specs)?;
        let topo_order = topological_order(&specs)?;

        let mut dependents: HashMap<StepName, Vec<StepName>> = specs
            .iter()
            .map(|s| (s.name.clone(), Vec::new()))
            .collect();
        for spec in &specs {
            for dep in &spec.after {
                if let Some(list) = dependents.get_mut(dep) {
                    list.push(spec.name.clone());
                }
            }
        }

        Ok(Self {
            specs,
            index,
            dependents,
            topo_order,
        })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// All steps in definition order.
    pub fn steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.specs.iter()
    }

    pub fn step(&self, name: &str) -> Option<&StepSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// Like [`step`](Self::step) but a missing name is an error.
    pub fn get(&self, name: &str) -> Result<&StepSpec> {
        self.step(name)
            .ok_or_else(|| RundagError::StepNotFound(name.to_string()))
    }

    /// Immediate dependencies of a step (its `after` list).
    pub fn dependencies_of(&self, name: &str) -> &[StepName] {
        self.step(name).map(|s| s.after.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a step (steps listing this one in `after`).
    pub fn dependents_of(&self, name: &str) -> &[StepName] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn critical_step(&self) -> Option<&StepSpec> {
        self.specs.iter().find(|s| s.critical)
    }

    pub fn report_step(&self) -> Option<&StepSpec> {
        self.specs.iter().find(|s| s.report)
    }

    /// Steps that run in the concurrent branch phase.
    pub fn branch_steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.specs.iter().filter(|s| s.is_branch_step())
    }

    /// Step names ordered so every step comes after its dependencies.
    pub fn topological_order(&self) -> &[StepName] {
        &self.topo_order
    }
}

fn validate_dependencies(specs: &[StepSpec], index: &HashMap<StepName, usize>) -> Result<()> {
    for spec in specs {
        for dep in &spec.after {
            if dep == &spec.name {
                return Err(RundagError::ConfigError(format!(
                    "step '{}' cannot depend on itself in `after`",
                    spec.name
                )));
            }
            if !index.contains_key(dep) {
                return Err(RundagError::ConfigError(format!(
                    "step '{}' has unknown dependency '{}' in `after`",
                    spec.name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_roles(specs: &[StepSpec]) -> Result<()> {
    let critical: Vec<&str> = specs
        .iter()
        .filter(|s| s.critical)
        .map(|s| s.name.as_str())
        .collect();
    if critical.len() > 1 {
        return Err(RundagError::ConfigError(format!(
            "only one step may be critical, found {:?}",
            critical
        )));
    }

    let report: Vec<&str> = specs
        .iter()
        .filter(|s| s.report)
        .map(|s| s.name.as_str())
        .collect();
    if report.len() > 1 {
        return Err(RundagError::ConfigError(format!(
            "only one step may be the report step, found {:?}",
            report
        )));
    }

    for spec in specs {
        if spec.critical && spec.report {
            return Err(RundagError::ConfigError(format!(
                "step '{}' cannot be both critical and the report step",
                spec.name
            )));
        }
        if spec.critical && !spec.after.is_empty() {
            return Err(RundagError::ConfigError(format!(
                "critical step '{}' runs first and cannot have dependencies",
                spec.name
            )));
        }
        if let Some(report) = report.first() {
            if spec.after.iter().any(|d| d == report) {
                return Err(RundagError::ConfigError(format!(
                    "step '{}' cannot depend on the report step '{}'",
                    spec.name, report
                )));
            }
        }
    }

    Ok(())
}

fn topological_order(specs: &[StepSpec]) -> Result<Vec<StepName>> {
    // Edge direction: dep -> step
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for spec in specs {
        graph.add_node(spec.name.as_str());
    }

    for spec in specs {
        for dep in &spec.after {
            graph.add_edge(dep.as_str(), spec.name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(RundagError::DagCycle(format!(
            "cycle detected in step DAG involving step '{}'",
            cycle.node_id()
        ))),
    }
}
