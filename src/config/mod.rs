//! Configuration module for the snapshot cleaner.
//!
//! The cleaner is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. The retention window
//! itself is not part of the file: it comes from the `SNAPSHOTS_DAYS_TO_KEEP`
//! environment variable (see [`RetentionPolicy`]).
//!
//! # Example
//!
//! ```toml
//! [azure]
//! subscription_id = "${AZURE_SUBSCRIPTION_ID}"
//! resource_group = "${AZURE_RESOURCE_GROUP}"
//!
//! [[filters]]
//! id = 1
//! description = "Nightly VM backups"
//! starts_with = "daily-"
//!
//! [[filters.tags]]
//! name = "backup"
//! match_only_with_name = true
//! ```

mod azure;
mod filters;
mod observability;
mod retention;
mod worker;

use std::path::Path;

pub use azure::*;
pub use filters::*;
pub use observability::*;
pub use retention::*;
use serde::{Deserialize, Serialize};
pub use worker::*;

/// Root configuration for the snapshot cleaner.
///
/// This struct represents the complete configuration file. The Azure scope
/// and the filter rule set are required; everything else has defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanerConfig {
    /// Azure subscription/resource-group scope and authentication.
    pub azure: AzureConfig,

    /// Retention exception rules. At least one rule is required: a snapshot
    /// is only ever deleted if it matches a rule and is past the cutoff.
    #[serde(default)]
    pub filters: Vec<FilterRule>,

    /// Worker loop settings (interval, dry-run).
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CleanerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: CleanerConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.azure.validate()?;
        validate_filters(&self.filters)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand `${VAR_NAME}` references with environment variable values.
///
/// Variables inside TOML comments are left untouched so commented-out
/// configuration does not have to resolve.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let whole = cap.get(0).expect("capture 0 always present");

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
