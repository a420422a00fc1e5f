// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::StepSpec;
use crate::errors::{Result, RundagError};
use crate::exec::RetryPolicy;
use crate::types::{DependencyPolicy, parse_duration};

/// Pipeline definition exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [config]
/// dependency_policy = "resolved"
/// retries = 2
/// retry_delay = "5s"
///
/// [default]
/// env = { CI = "1" }
///
/// [step.Global_Setup]
/// cmd = "pytest test_engine.py::test_global_setup"
/// critical = true
///
/// [step.Node_1_Config]
/// cmd = "pytest test_engine.py::test_node_config"
/// after = ["Global_Setup"]
/// branch = "1"
/// ```
///
/// All sections are optional and have reasonable defaults, but at least one
/// `[step.<name>]` is required for the file to validate.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Run-wide behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Values merged into every step from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All steps from `[step.<name>]`, keyed by step name.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,
}

/// A validated pipeline definition.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders can rely on
/// the dependency graph being well formed and every duration parsing.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub step: BTreeMap<String, StepConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        step: BTreeMap<String, StepConfig>,
    ) -> Self {
        Self {
            config,
            default,
            step,
        }
    }

    /// Resolve every `[step.<name>]` into a [`StepSpec`] with its effective
    /// context and retry policy.
    pub fn step_specs(&self) -> Result<Vec<StepSpec>> {
        resolve_steps(&self.config, &self.default, &self.step)
    }
}

impl RawConfigFile {
    /// Same as [`ConfigFile::step_specs`], for validation before the gate.
    pub(crate) fn step_specs(&self) -> Result<Vec<StepSpec>> {
        resolve_steps(&self.config, &self.default, &self.step)
    }
}

fn resolve_steps(
    config: &ConfigSection,
    defaults: &DefaultSection,
    steps: &BTreeMap<String, StepConfig>,
) -> Result<Vec<StepSpec>> {
    steps
        .iter()
        .map(|(name, step)| step.to_spec(name, config, defaults))
        .collect()
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"resolved"` (default) or `"succeeded"`.
    ///
    /// Decides whether a dependent step waits for its dependencies to merely
    /// finish, or to finish successfully.
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,

    /// Retries after the first attempt, for steps that do not override it.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay between attempts (e.g. `"5s"`).
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    /// Optional per-attempt deadline (e.g. `"10m"`).
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay() -> String {
    "5s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            dependency_policy: DependencyPolicy::default(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            timeout: None,
        }
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Environment merged into every step's context. Step-level `env`
    /// entries win on conflict.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[step.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Shell command line executed for this step.
    pub cmd: String,

    /// Steps that must resolve before this one is submitted.
    #[serde(default)]
    pub after: Vec<String>,

    /// A failing critical step aborts the whole run. At most one per file.
    #[serde(default)]
    pub critical: bool,

    /// The final reporting step, run once after every branch step resolved.
    #[serde(default)]
    pub report: bool,

    /// Branch / node identifier, exported to the command as `NODE_ID`.
    #[serde(default)]
    pub branch: Option<String>,

    /// Extra environment for this step only.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Overrides `[config].retries`.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Overrides `[config].retry_delay`.
    #[serde(default)]
    pub retry_delay: Option<String>,

    /// Overrides `[config].timeout`.
    #[serde(default)]
    pub timeout: Option<String>,
}

impl StepConfig {
    /// Effective retry policy given the run-wide `[config]` section.
    pub fn retry_policy(&self, global: &ConfigSection) -> Result<RetryPolicy> {
        let retries = self.retries.unwrap_or(global.retries);
        let delay_str = self.retry_delay.as_deref().unwrap_or(&global.retry_delay);
        let delay = parse_duration(delay_str).map_err(RundagError::ConfigError)?;

        let mut policy = RetryPolicy::new(retries.saturating_add(1), delay);
        if let Some(timeout) = self.timeout.as_deref().or(global.timeout.as_deref()) {
            let timeout = parse_duration(timeout).map_err(RundagError::ConfigError)?;
            policy = policy.with_timeout(timeout);
        }
        Ok(policy)
    }

    fn to_spec(
        &self,
        name: &str,
        global: &ConfigSection,
        defaults: &DefaultSection,
    ) -> Result<StepSpec> {
        let mut env = defaults.env.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut spec = StepSpec::new(name, &self.cmd)
            .with_env(env)
            .with_retry(self.retry_policy(global)?)
            .critical(self.critical)
            .report(self.report);

        for dep in &self.after {
            spec = spec.after(dep);
        }
        if let Some(branch) = &self.branch {
            spec = spec.branch(branch);
        }
        Ok(spec)
    }
}
