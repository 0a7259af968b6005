use serde::{Deserialize, Serialize};
use std::{
    num::{NonZeroU64, NonZeroUsize},
    str::FromStr,
};
use thiserror::Error;
use tracing::Level;

use crate::defaults;

/// Host configuration, as read from a YAML file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
    #[serde(default = "default_compute_budget")]
    pub compute_budget: u64,
    #[serde(default)]
    pub gas: GasSchedule,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: default_max_call_depth(),
            compute_budget: default_compute_budget(),
            gas: GasSchedule::default(),
            log_level: default_log_level(),
        }
    }
}

/// Cost charged against the shared compute budget for each host operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Every pushed frame, the root frame included.
    pub call: u64,
    pub read: u64,
    pub write: u64,
    pub write_byte: u64,
    pub emit: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            call: defaults::DEFAULT_GAS_CALL,
            read: defaults::DEFAULT_GAS_READ,
            write: defaults::DEFAULT_GAS_WRITE,
            write_byte: defaults::DEFAULT_GAS_WRITE_BYTE,
            emit: defaults::DEFAULT_GAS_EMIT,
        }
    }
}

impl GasSchedule {
    pub fn write_cost(&self, len: usize) -> u64 {
        self.write
            .saturating_add(self.write_byte.saturating_mul(len as u64))
    }
}

fn default_max_call_depth() -> usize {
    defaults::DEFAULT_MAX_CALL_DEPTH
}

fn default_compute_budget() -> u64 {
    defaults::DEFAULT_COMPUTE_BUDGET
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be <= {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub max_call_depth: NonZeroUsize,
    pub compute_budget: NonZeroU64,
    pub gas: GasSchedule,
    pub log_level: Level,
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        Self {
            max_call_depth: NonZeroUsize::new(defaults::DEFAULT_MAX_CALL_DEPTH)
                .unwrap_or(NonZeroUsize::MIN),
            compute_budget: NonZeroU64::new(defaults::DEFAULT_COMPUTE_BUDGET)
                .unwrap_or(NonZeroU64::MIN),
            gas: GasSchedule::default(),
            log_level: Level::INFO,
        }
    }
}

fn nonzero_usize(field: &'static str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or(ConfigError::InvalidNonZero { field, value: 0 })
}

fn nonzero_u64(field: &'static str, value: u64) -> Result<NonZeroU64, ConfigError> {
    NonZeroU64::new(value).ok_or(ConfigError::InvalidNonZero { field, value: 0 })
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let max_call_depth = nonzero_usize("max_call_depth", self.max_call_depth)?;
        if max_call_depth.get() > defaults::MAX_CALL_DEPTH_LIMIT {
            return Err(ConfigError::OutOfRange {
                field: "max_call_depth",
                value: max_call_depth.get() as u64,
                max: defaults::MAX_CALL_DEPTH_LIMIT as u64,
            });
        }
        let compute_budget = nonzero_u64("compute_budget", self.compute_budget)?;
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        Ok(ValidatedConfig {
            max_call_depth,
            compute_budget,
            gas: self.gas,
            log_level,
        })
    }
}
