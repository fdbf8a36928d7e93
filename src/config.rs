use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Seconds the caret/selection must stay untouched before it is recorded as a stop
    #[serde(default = "default_idle_time")]
    pub idle_time_secs: f64,

    /// Maximum number of stops kept per document; the oldest is evicted first
    #[serde(default = "default_max_stops")]
    pub max_stops: usize,

    /// How often a focused document is polled for idleness, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How far into the future the activity timestamp is pushed after a stop
    /// is recorded or while an edit is being processed, in seconds
    #[serde(default = "default_idle_push")]
    pub idle_push_secs: u64,

    #[serde(default)]
    pub diff: DiffConfig,
}

fn default_idle_time() -> f64 {
    2.0
}

fn default_max_stops() -> usize {
    30
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_idle_push() -> u64 {
    999
}

/// Time budget for splitting an edited region into hunks.
///
/// The budget grows with the size of the changed region:
/// `base_budget_secs + region_len / chars_per_budget_sec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiffConfig {
    #[serde(default = "default_base_budget")]
    pub base_budget_secs: u64,

    #[serde(default = "default_chars_per_budget_sec")]
    pub chars_per_budget_sec: u64,
}

fn default_base_budget() -> u64 {
    3
}

fn default_chars_per_budget_sec() -> u64 {
    100_000
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            base_budget_secs: default_base_budget(),
            chars_per_budget_sec: default_chars_per_budget_sec(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_time_secs: default_idle_time(),
            max_stops: default_max_stops(),
            poll_interval_ms: default_poll_interval(),
            idle_push_secs: default_idle_push(),
            diff: DiffConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// JSON schema of the configuration file
    pub fn json_schema() -> serde_json::Value {
        schemars::schema_for!(Config).to_value()
    }

    /// Idle time before a stop is recorded. Values too large for a
    /// `Duration` saturate; `validate` rejects them.
    pub fn idle_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.idle_time_secs).unwrap_or(Duration::MAX)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_push(&self) -> Duration {
        Duration::from_secs(self.idle_push_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Duration::try_from_secs_f64(self.idle_time_secs).is_err() {
            return Err(ConfigError::ValidationError(
                "idle_time_secs must be a non-negative number of seconds within duration range".to_string(),
            ));
        }

        if self.max_stops == 0 {
            return Err(ConfigError::ValidationError(
                "max_stops must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.diff.chars_per_budget_sec == 0 {
            return Err(ConfigError::ValidationError(
                "diff.chars_per_budget_sec must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
