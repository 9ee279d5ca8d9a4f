//! Worker loop settings.

use serde::{Deserialize, Serialize};

fn default_interval_hours() -> u64 {
    24
}

/// Settings for the scheduled cleaner worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// How often to run a cleaning pass (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// If true, log what would be deleted without actually deleting.
    /// Useful for testing a new filter set before enabling it.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            dry_run: false,
        }
    }
}

impl WorkerConfig {
    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours * 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.interval_hours, 24);
        assert!(!config.dry_run);
        assert_eq!(config.interval(), std::time::Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_parse() {
        let config: WorkerConfig = toml::from_str(
            r#"
            interval_hours = 6
            dry_run = true
        "#,
        )
        .unwrap();
        assert_eq!(config.interval_hours, 6);
        assert!(config.dry_run);
        assert_eq!(config.interval(), std::time::Duration::from_secs(6 * 3600));
    }
}
