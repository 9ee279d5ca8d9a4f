//! Streaming collection of deletion candidates.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;

use super::matched_rule_ids;
use crate::{
    azure::{ArmError, SnapshotRecord, SnapshotStream},
    config::FilterRule,
};

/// The deduplicated set of snapshots selected for deletion in one pass,
/// keyed by resource name.
///
/// The set invariant is structural: inserting a snapshot whose name is
/// already present is a no-op, so a snapshot matching several rules is
/// deleted at most once.
#[derive(Debug, Default)]
pub struct CandidateSet {
    names: HashSet<String>,
    records: Vec<SnapshotRecord>,
}

impl CandidateSet {
    /// Insert a record unless one with the same name is already present.
    /// Returns whether the record was newly added.
    pub fn insert(&mut self, record: SnapshotRecord) -> bool {
        if self.names.insert(record.name.clone()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<SnapshotRecord> {
        self.records
    }
}

/// Per-pass evaluation tallies, for the run summary log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Snapshots enumerated (after the resource-type check).
    pub evaluated: u64,
    /// Snapshots that matched at least one filter rule.
    pub matched: u64,
    /// Matched snapshots kept because they are inside the retention window
    /// or have no creation timestamp.
    pub retained: u64,
    /// Snapshots marked for deletion.
    pub marked: u64,
}

/// A completed collection pass: the candidate set plus its tallies.
#[derive(Debug)]
pub struct Collection {
    pub candidates: CandidateSet,
    pub summary: CollectionSummary,
}

/// Consume the snapshot stream once and build the deletion candidate set.
///
/// Resources whose type suffix is not `snapshots` are ignored. Snapshots
/// matching no rule are skipped silently. A matched snapshot is marked for
/// deletion only when its creation time is known and before `cutoff`;
/// otherwise it is logged as retained. Any stream error aborts the pass:
/// a partial enumeration cannot be trusted to produce a correct set.
pub async fn collect_candidates(
    mut stream: SnapshotStream<'_>,
    rules: &[FilterRule],
    cutoff: DateTime<Utc>,
) -> Result<Collection, ArmError> {
    let mut candidates = CandidateSet::default();
    let mut summary = CollectionSummary::default();

    while let Some(record) = stream.next().await {
        let record = record?;

        if record.type_suffix() != "snapshots" {
            continue;
        }
        summary.evaluated += 1;

        let rule_ids = matched_rule_ids(&record, rules);
        if rule_ids.is_empty() {
            continue;
        }
        summary.matched += 1;
        tracing::info!(
            snapshot = %record.name,
            created_on = ?record.created_on,
            rule_ids = ?rule_ids,
            "Snapshot passed retention filters"
        );

        match record.created_on {
            Some(created) if created < cutoff => {
                let name = record.name.clone();
                if candidates.insert(record) {
                    summary.marked += 1;
                    tracing::warn!(
                        snapshot = %name,
                        created_on = %created,
                        "Snapshot marked for deletion"
                    );
                }
            }
            Some(_) => {
                summary.retained += 1;
                tracing::info!(
                    snapshot = %record.name,
                    "Snapshot is inside the deletion time window, retained"
                );
            }
            None => {
                summary.retained += 1;
                tracing::info!(
                    snapshot = %record.name,
                    "Snapshot has no creation timestamp, retained"
                );
            }
        }
    }

    Ok(Collection {
        candidates,
        summary,
    })
}
