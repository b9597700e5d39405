//! Deployment configuration, loaded from a YAML file and layered with CLI
//! overrides (§4.14). Validation failures surface as [`ConfigError`] rather
//! than panicking, since a malformed file is an operator mistake, not a bug.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stn::AllocationMethod;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: serde_yaml::Error },
    #[error("fleet must list at least one robot")]
    EmptyFleet,
    #[error("round_timeout_secs must be positive, got {0}")]
    NonPositiveTimeout(f64),
}

/// Top-level deployment configuration: which solver the fleet runs, how
/// many round retries alternative-timeslot escalation gets, and the static
/// roster of robots the allocator expects to hear from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_allocation_method")]
    pub allocation_method: AllocationMethod,
    #[serde(default = "default_max_retries")]
    pub max_round_retries: u32,
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: f64,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: f64,
    /// How many tasks ahead of a robot's current position a
    /// `D-GRAPH-UPDATE` broadcast covers (§4.1, `Timetable::get_d_graph_update`).
    #[serde(default = "default_n_tasks_queue")]
    pub n_tasks_queue: usize,
    pub fleet: Vec<String>,
    #[serde(default)]
    pub store_path: Option<String>,
}

fn default_allocation_method() -> AllocationMethod {
    AllocationMethod::Tessi
}

fn default_max_retries() -> u32 {
    1
}

fn default_round_timeout_secs() -> f64 {
    5.0
}

fn default_tick_interval_secs() -> f64 {
    0.5
}

fn default_n_tasks_queue() -> usize {
    3
}

impl Config {
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fleet.is_empty() {
            return Err(ConfigError::EmptyFleet);
        }
        if self.round_timeout_secs <= 0.0 {
            return Err(ConfigError::NonPositiveTimeout(self.round_timeout_secs));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_in_defaults() {
        let config = Config::from_yaml_str("fleet: [robot_001, robot_002]\n").unwrap();
        assert_eq!(config.max_round_retries, 1);
        assert_eq!(config.allocation_method, AllocationMethod::Tessi);
        config.validate().unwrap();
    }

    #[test]
    fn empty_fleet_fails_validation() {
        let config = Config::from_yaml_str("fleet: []\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyFleet)));
    }
}
