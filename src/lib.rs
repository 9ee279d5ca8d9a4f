//! snapsweep — retention-policy driven cleaner for Azure managed disk snapshots.
//!
//! The cleaner enumerates snapshot resources in a resource group, evaluates
//! each one against an operator-configured set of filter rules (name prefix
//! and tag predicates), and deletes the snapshots that match a rule and were
//! created before the retention cutoff. Deletions are issued one at a time
//! and a failure on one snapshot never aborts the rest of the batch.
//!
//! The crate is split into:
//! - [`config`] — TOML configuration with `${VAR}` environment expansion,
//!   filter rule model and retention window validation
//! - [`azure`] — Azure Resource Manager collaborators: token acquisition,
//!   paginated resource listing, and delete-with-polling
//! - [`cleaner`] — the decision engine: rule matching, candidate collection,
//!   and the deletion executor, plus the scheduled worker loop
//! - [`observability`] — tracing subscriber initialization

pub mod azure;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod observability;
