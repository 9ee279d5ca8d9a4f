//! Run-level error taxonomy.
//!
//! Configuration and enumeration problems are fatal for a pass and surface
//! here. Per-snapshot deletion failures are deliberately not errors: they
//! are isolated outcomes carried in
//! [`DeletionOutcome`](crate::cleaner::DeletionOutcome).

use thiserror::Error;

use crate::{azure::ArmError, config::ConfigError};

/// Fatal errors for a cleaning pass.
#[derive(Debug, Error)]
pub enum CleanerError {
    /// Invalid or missing configuration: bad rule set, bad retention value.
    /// Aborts before any deletion is attempted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Resource enumeration failed mid-stream. A partial listing cannot be
    /// trusted to produce a correct candidate set, so the pass is aborted.
    #[error("Failed to enumerate snapshots: {0}")]
    Enumeration(#[from] ArmError),
}
