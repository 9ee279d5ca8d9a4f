//! Retention decision engine for snapshots.
//!
//! A cleaning pass flows through three stages:
//! 1. [`matcher`] — evaluate each enumerated snapshot against the filter
//!    rule set, collecting every matching rule id
//! 2. [`collector`] — apply the retention cutoff to matched snapshots and
//!    build the deduplicated deletion candidate set, consuming the resource
//!    stream exactly once
//! 3. [`executor`] — delete each candidate independently, so one failure
//!    never aborts the rest of the batch
//!
//! [`worker`] ties the stages together into single passes and a scheduled
//! loop with dry-run support.

mod collector;
mod executor;
mod matcher;
mod worker;

pub use collector::{CandidateSet, Collection, CollectionSummary, collect_candidates};
pub use executor::{DeletionOutcome, DeletionStatus, execute_deletions};
pub use matcher::matched_rule_ids;
pub use worker::{CleanRunResult, run_once, start_cleaner_worker};
