//! Retention window configuration.
//!
//! The number of days to keep snapshots comes from the
//! `SNAPSHOTS_DAYS_TO_KEEP` environment variable and is validated once at
//! startup. Values outside the permitted range abort the run rather than
//! being clamped.

use chrono::{DateTime, Duration, Utc};

use super::ConfigError;

/// Environment variable holding the number of days to keep snapshots.
pub const SNAPSHOTS_DAYS_TO_KEEP_VAR: &str = "SNAPSHOTS_DAYS_TO_KEEP";

/// Minimum permitted retention, in days.
pub const MIN_SNAPSHOT_DAYS: i64 = 3;
/// Maximum permitted retention, in days.
pub const MAX_SNAPSHOT_DAYS: i64 = 3650;

/// A validated retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    days_to_keep: i64,
}

impl RetentionPolicy {
    /// Read and validate the retention window from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var(SNAPSHOTS_DAYS_TO_KEEP_VAR).ok();
        Self::from_env_value(raw.as_deref())
    }

    /// Validate a raw retention-days value.
    ///
    /// Fails if the value is absent/empty, does not parse as an integer, or
    /// falls outside `[MIN_SNAPSHOT_DAYS, MAX_SNAPSHOT_DAYS]`.
    pub fn from_env_value(raw: Option<&str>) -> Result<Self, ConfigError> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            ConfigError::Validation(format!(
                "Environment variable {SNAPSHOTS_DAYS_TO_KEEP_VAR} is not set"
            ))
        })?;

        let days: i64 = raw.parse().map_err(|_| invalid_days(raw))?;
        if !(MIN_SNAPSHOT_DAYS..=MAX_SNAPSHOT_DAYS).contains(&days) {
            return Err(invalid_days(raw));
        }

        Ok(Self { days_to_keep: days })
    }

    /// The validated number of days to keep snapshots.
    pub fn days_to_keep(&self) -> i64 {
        self.days_to_keep
    }

    /// The cutoff instant for a pass starting at `now_utc`: snapshots
    /// created before this instant are past retention.
    ///
    /// Pure and deterministic; callers inject the clock.
    pub fn cutoff(&self, now_utc: DateTime<Utc>) -> DateTime<Utc> {
        now_utc - Duration::days(self.days_to_keep)
    }
}

fn invalid_days(raw: &str) -> ConfigError {
    ConfigError::Validation(format!(
        "Environment variable {SNAPSHOTS_DAYS_TO_KEEP_VAR}={raw} is not a valid integer. \
         Please use a value between {MIN_SNAPSHOT_DAYS} and {MAX_SNAPSHOT_DAYS}"
    ))
}
