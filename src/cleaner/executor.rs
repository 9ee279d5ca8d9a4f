//! Deletion execution with per-item failure isolation.

use super::CandidateSet;
use crate::azure::SnapshotDeleter;

/// Outcome of one deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub name: String,
    pub status: DeletionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Deleted,
    Failed(String),
}

impl DeletionStatus {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionStatus::Deleted)
    }
}

/// Delete every candidate, one at a time, awaiting each operation's
/// terminal status before moving on.
///
/// A failed deletion is logged and recorded in its outcome; it never stops
/// the remaining candidates from being attempted. There is no retry here:
/// a snapshot whose deletion failed is simply re-evaluated by the next
/// scheduled pass.
pub async fn execute_deletions(
    deleter: &dyn SnapshotDeleter,
    candidates: CandidateSet,
) -> Vec<DeletionOutcome> {
    let mut outcomes = Vec::with_capacity(candidates.len());

    for record in candidates.into_records() {
        tracing::warn!(snapshot = %record.name, "Deleting snapshot");

        let status = match deleter.delete_snapshot(&record).await {
            Ok(()) => {
                tracing::warn!(snapshot = %record.name, "Snapshot deleted");
                DeletionStatus::Deleted
            }
            Err(e) => {
                tracing::error!(
                    snapshot = %record.name,
                    error = %e,
                    "Error deleting snapshot"
                );
                DeletionStatus::Failed(e.to_string())
            }
        };

        outcomes.push(DeletionOutcome {
            name: record.name,
            status,
        });
    }

    outcomes
}
