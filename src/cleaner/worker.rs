//! Cleaner worker orchestrating scheduled retention passes.

use std::sync::Arc;

use chrono::Utc;

use super::{DeletionStatus, collect_candidates, execute_deletions};
use crate::{
    azure::{SnapshotDeleter, SnapshotLister},
    config::{FilterRule, RetentionPolicy, WorkerConfig},
    error::CleanerError,
};

/// Results from a single cleaning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanRunResult {
    /// Snapshots enumerated and evaluated.
    pub evaluated: u64,
    /// Snapshots that matched at least one filter rule.
    pub matched: u64,
    /// Matched snapshots kept (inside the window or no timestamp).
    pub retained: u64,
    /// Snapshots successfully deleted.
    pub deleted: u64,
    /// Snapshots whose deletion failed.
    pub failed: u64,
}

impl CleanRunResult {
    /// Number of deletion attempts made in this pass.
    pub fn attempted(&self) -> u64 {
        self.deleted + self.failed
    }
}

/// Run a single evaluation + deletion pass.
///
/// Configuration and enumeration errors abort the pass before any deletion
/// is attempted; per-snapshot deletion failures are isolated and tallied in
/// the result. In dry-run mode the candidate set is logged but no deletion
/// is issued.
pub async fn run_once(
    lister: &dyn SnapshotLister,
    deleter: &dyn SnapshotDeleter,
    rules: &[FilterRule],
    retention: RetentionPolicy,
    dry_run: bool,
) -> Result<CleanRunResult, CleanerError> {
    let cutoff = retention.cutoff(Utc::now());
    tracing::info!(
        days_to_keep = retention.days_to_keep(),
        cutoff = %cutoff,
        "Initiating snapshots listing"
    );

    let collection = collect_candidates(lister.list_snapshots(), rules, cutoff).await?;

    let mut result = CleanRunResult {
        evaluated: collection.summary.evaluated,
        matched: collection.summary.matched,
        retained: collection.summary.retained,
        ..Default::default()
    };

    if dry_run {
        for record in collection.candidates.iter() {
            tracing::info!(
                snapshot = %record.name,
                created_on = ?record.created_on,
                "DRY RUN: would delete snapshot"
            );
        }
        return Ok(result);
    }

    let outcomes = execute_deletions(deleter, collection.candidates).await;
    for outcome in &outcomes {
        match outcome.status {
            DeletionStatus::Deleted => result.deleted += 1,
            DeletionStatus::Failed(_) => result.failed += 1,
        }
    }

    Ok(result)
}

/// Starts the cleaner worker as a background task.
///
/// The worker runs a cleaning pass at the configured interval, indefinitely
/// until the task is cancelled. A failed pass is logged and retried no
/// earlier than the next scheduled interval; a failed deletion is retried
/// only by the next pass naturally re-evaluating the same snapshot.
pub async fn start_cleaner_worker<C>(
    client: Arc<C>,
    rules: Arc<Vec<FilterRule>>,
    retention: RetentionPolicy,
    config: WorkerConfig,
) where
    C: SnapshotLister + SnapshotDeleter,
{
    let dry_run_msg = if config.dry_run { " (DRY RUN)" } else { "" };

    tracing::info!(
        interval_hours = config.interval_hours,
        days_to_keep = retention.days_to_keep(),
        dry_run = config.dry_run,
        "Starting snapshot cleaner worker{}",
        dry_run_msg
    );

    let interval = config.interval();

    loop {
        match run_once(
            client.as_ref(),
            client.as_ref(),
            &rules,
            retention,
            config.dry_run,
        )
        .await
        {
            Ok(result) => {
                if result.attempted() > 0 || result.matched > 0 {
                    tracing::info!(
                        evaluated = result.evaluated,
                        matched = result.matched,
                        retained = result.retained,
                        deleted = result.deleted,
                        failed = result.failed,
                        dry_run = config.dry_run,
                        "Cleaning pass complete{}",
                        dry_run_msg
                    );
                } else {
                    tracing::debug!("Cleaning pass complete, no snapshots matched");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error running cleaning pass");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Mutex,
    };

    use async_trait::async_trait;
    use chrono::Duration;
    use futures::StreamExt;

    use super::*;
    use crate::azure::{ArmError, SnapshotRecord, SnapshotStream};

    /// In-memory Azure standing in for both collaborators.
    struct FakeAzure {
        records: Vec<SnapshotRecord>,
        fail_names: Vec<String>,
        deleted: Mutex<Vec<String>>,
    }

    impl FakeAzure {
        fn new(records: Vec<SnapshotRecord>) -> Self {
            Self {
                records,
                fail_names: Vec::new(),
                deleted: Mutex::new(Vec::new()),
            }
        }
    }

    impl SnapshotLister for FakeAzure {
        fn list_snapshots(&self) -> SnapshotStream<'_> {
            futures::stream::iter(self.records.clone().into_iter().map(Ok)).boxed()
        }
    }

    #[async_trait]
    impl SnapshotDeleter for FakeAzure {
        async fn delete_snapshot(&self, record: &SnapshotRecord) -> Result<(), ArmError> {
            if self.fail_names.contains(&record.name) {
                return Err(ArmError::OperationFailed("Conflict".into()));
            }
            self.deleted.lock().unwrap().push(record.name.clone());
            Ok(())
        }
    }

    fn snapshot(name: &str, age_days: i64, tags: Option<&[(&str, &str)]>) -> SnapshotRecord {
        SnapshotRecord {
            id: format!("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/snapshots/{name}"),
            name: name.to_string(),
            resource_type: "Microsoft.Compute/snapshots".to_string(),
            created_on: Some(Utc::now() - Duration::days(age_days)),
            tags: tags.map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>()
            }),
        }
    }

    fn prefix_rules() -> Vec<FilterRule> {
        vec![FilterRule {
            id: 1,
            description: None,
            starts_with: Some("daily-".to_string()),
            tags: Vec::new(),
        }]
    }

    fn retention_days(days: &str) -> RetentionPolicy {
        RetentionPolicy::from_env_value(Some(days)).unwrap()
    }

    #[tokio::test]
    async fn test_pass_deletes_old_matched_snapshots() {
        let azure = FakeAzure::new(vec![
            snapshot("daily-old", 10, None),
            snapshot("daily-young", 1, None),
            snapshot("weekly-old", 10, None),
        ]);

        let result = run_once(&azure, &azure, &prefix_rules(), retention_days("3"), false)
            .await
            .unwrap();

        assert_eq!(result.evaluated, 3);
        assert_eq!(result.matched, 2);
        assert_eq!(result.retained, 1);
        assert_eq!(result.deleted, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(*azure.deleted.lock().unwrap(), vec!["daily-old".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let azure = FakeAzure::new(vec![snapshot("daily-old", 10, None)]);

        let result = run_once(&azure, &azure, &prefix_rules(), retention_days("3"), true)
            .await
            .unwrap();

        assert_eq!(result.matched, 1);
        assert_eq!(result.attempted(), 0);
        assert!(azure.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_deletion_tallied_and_isolated() {
        let mut azure = FakeAzure::new(vec![
            snapshot("daily-a", 10, None),
            snapshot("daily-b", 10, None),
            snapshot("daily-c", 10, None),
        ]);
        azure.fail_names = vec!["daily-b".to_string()];

        let result = run_once(&azure, &azure, &prefix_rules(), retention_days("3"), false)
            .await
            .unwrap();

        assert_eq!(result.deleted, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(
            *azure.deleted.lock().unwrap(),
            vec!["daily-a".to_string(), "daily-c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_enumeration_error_aborts_before_deletion() {
        struct BrokenLister;

        impl SnapshotLister for BrokenLister {
            fn list_snapshots(&self) -> SnapshotStream<'_> {
                futures::stream::iter(vec![Err(ArmError::Auth("expired".into()))]).boxed()
            }
        }

        let azure = FakeAzure::new(Vec::new());
        let err = run_once(
            &BrokenLister,
            &azure,
            &prefix_rules(),
            retention_days("3"),
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CleanerError::Enumeration(_)));
        assert!(azure.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keep_tag_rule_end_to_end() {
        let rules = vec![FilterRule {
            id: 1,
            description: None,
            starts_with: None,
            tags: vec![crate::config::TagMatcher {
                name: "keep".to_string(),
                value: None,
                match_only_with_name: true,
            }],
        }];

        let azure = FakeAzure::new(vec![
            snapshot("snap-a", 10, Some(&[("keep", "anything")])),
            snapshot("snap-b", 10, None),
        ]);

        let result = run_once(&azure, &azure, &rules, retention_days("3"), false)
            .await
            .unwrap();

        assert_eq!(result.deleted, 1);
        assert_eq!(*azure.deleted.lock().unwrap(), vec!["snap-a".to_string()]);
    }
}
