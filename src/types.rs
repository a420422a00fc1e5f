use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// When a dependent step becomes ready.
///
/// - `Resolved`: every dependency has a terminal result, whether it succeeded
///   or failed. A failed upstream step does not stop its dependents.
/// - `Succeeded`: every dependency succeeded. Dependents of a failed step are
///   skipped and resolved as failed without being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    #[default]
    Resolved,
    Succeeded,
}

impl FromStr for DependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resolved" => Ok(DependencyPolicy::Resolved),
            "succeeded" => Ok(DependencyPolicy::Succeeded),
            other => Err(format!(
                "invalid dependency_policy: {other} (expected \"resolved\" or \"succeeded\")"
            )),
        }
    }
}

impl fmt::Display for DependencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyPolicy::Resolved => f.write_str("resolved"),
            DependencyPolicy::Succeeded => f.write_str("succeeded"),
        }
    }
}

/// Parse a duration string such as `"500ms"`, `"5s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("s").is_err());
        assert_eq!(
            parse_duration("307445734561825861m"),
            Err("duration '307445734561825861m' is too large".to_string())
        );
        assert!(parse_duration("5124095576030432h").is_err());
        assert!(parse_duration("18446744073709551615s").is_ok());
    }

    #[test]
    fn policy_from_str_is_case_insensitive() {
        assert_eq!(
            "Resolved".parse::<DependencyPolicy>(),
            Ok(DependencyPolicy::Resolved)
        );
        assert_eq!(
            "SUCCEEDED".parse::<DependencyPolicy>(),
            Ok(DependencyPolicy::Succeeded)
        );
        assert!("maybe".parse::<DependencyPolicy>().is_err());
    }
}
