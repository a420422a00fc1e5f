use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::RunGraph;
use crate::errors::{Result, RundagError};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RundagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.step))
    }
}

/// Run every check that must pass before a pipeline may execute.
///
/// Structural problems of the graph itself (unknown or self dependencies,
/// cycles, misplaced critical/report steps) are detected by
/// [`RunGraph::new`], which this delegates to.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_steps(cfg)?;
    validate_global_config(cfg)?;
    validate_steps(cfg)?;
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_steps(cfg: &RawConfigFile) -> Result<()> {
    if cfg.step.is_empty() {
        return Err(RundagError::ConfigError(
            "config must contain at least one [step.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    parse_duration(&cfg.config.retry_delay).map_err(|e| {
        RundagError::ConfigError(format!("[config].retry_delay is invalid: {e}"))
    })?;

    if let Some(timeout) = &cfg.config.timeout {
        let parsed = parse_duration(timeout).map_err(|e| {
            RundagError::ConfigError(format!("[config].timeout is invalid: {e}"))
        })?;
        if parsed.is_zero() {
            return Err(RundagError::ConfigError(
                "[config].timeout must be greater than zero".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_steps(cfg: &RawConfigFile) -> Result<()> {
    for (name, step) in cfg.step.iter() {
        if step.cmd.trim().is_empty() {
            return Err(RundagError::ConfigError(format!(
                "step '{}' has an empty `cmd`",
                name
            )));
        }

        if let Some(delay) = &step.retry_delay {
            parse_duration(delay).map_err(|e| {
                RundagError::ConfigError(format!("step '{name}' has invalid `retry_delay`: {e}"))
            })?;
        }

        if let Some(timeout) = &step.timeout {
            let parsed = parse_duration(timeout).map_err(|e| {
                RundagError::ConfigError(format!("step '{name}' has invalid `timeout`: {e}"))
            })?;
            if parsed.is_zero() {
                return Err(RundagError::ConfigError(format!(
                    "step '{name}' has a zero `timeout`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    RunGraph::new(cfg.step_specs()?)?;
    Ok(())
}
