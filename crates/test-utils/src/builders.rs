#![allow(dead_code)]

use std::collections::BTreeMap;

use rundag::config::{ConfigFile, ConfigSection, DefaultSection, RawConfigFile, StepConfig};
use rundag::types::DependencyPolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                step: BTreeMap::new(),
            },
        }
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.step.insert(name.to_string(), step);
        self
    }

    pub fn with_policy(mut self, policy: DependencyPolicy) -> Self {
        self.config.config.dependency_policy = policy;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.config.config.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: &str) -> Self {
        self.config.config.retry_delay = delay.to_string();
        self
    }

    pub fn with_default_env(mut self, key: &str, value: &str) -> Self {
        self.config
            .default
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                cmd: cmd.to_string(),
                after: vec![],
                critical: false,
                report: false,
                branch: None,
                env: BTreeMap::new(),
                retries: None,
                retry_delay: None,
                timeout: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.after.push(dep.to_string());
        self
    }

    pub fn critical(mut self) -> Self {
        self.step.critical = true;
        self
    }

    pub fn report(mut self) -> Self {
        self.step.report = true;
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.step.branch = Some(branch.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.step.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.step.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: &str) -> Self {
        self.step.retry_delay = Some(delay.to_string());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.step.timeout = Some(timeout.to_string());
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
