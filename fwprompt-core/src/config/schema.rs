//! Configuration schema types

use crate::error::ValidationError;
use crate::types::{Action, DurationOption};
use serde::{Deserialize, Serialize};

/// Complete prompt configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Common settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommonConfig {
    /// Debug logging, same as `--verbose`
    #[serde(default)]
    pub verbose: bool,
}

/// Defaults applied to every prompt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// Seconds before the default action is applied
    #[serde(default = "default_timeout")]
    pub default_timeout: i64,
    #[serde(default = "default_action")]
    pub default_action: String,
    /// Either a selector label ("for this session") or a rule value
    #[serde(default = "default_duration")]
    pub default_duration: String,
    /// Primary candidate preselected when the process is known
    #[serde(default)]
    pub default_target: usize,
}

pub const DEFAULT_TIMEOUT_SECS: i64 = 15;

fn default_timeout() -> i64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_action() -> String {
    Action::Deny.as_str().to_string()
}

fn default_duration() -> String {
    DurationOption::UntilRestart.label().to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            default_action: default_action(),
            default_duration: default_duration(),
            default_target: 0,
        }
    }
}

impl PromptConfig {
    pub fn timeout_secs(&self) -> Result<u64, ValidationError> {
        u64::try_from(self.default_timeout).map_err(|_| ValidationError::NegativeTimeout {
            value: self.default_timeout,
        })
    }

    pub fn action(&self) -> Result<Action, ValidationError> {
        self.default_action.parse()
    }

    /// Configured duration, "for this session" when unrecognised
    pub fn duration(&self) -> DurationOption {
        DurationOption::from_setting(&self.default_duration)
            .unwrap_or(DurationOption::UntilRestart)
    }
}
