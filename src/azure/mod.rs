//! Azure collaborators: resource enumeration and deletion.
//!
//! The cleaner core only depends on the [`SnapshotLister`] and
//! [`SnapshotDeleter`] traits; [`ArmClient`] implements both against the
//! Azure Resource Manager REST API.

mod arm;
mod token;

use std::collections::HashMap;

pub use arm::{ARM_API_VERSION, ArmClient, ArmError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
pub use token::{AZURE_MANAGEMENT_SCOPE, AzureTokenSource, BearerTokenSource};

/// Read-only view of a snapshot resource as returned by the ARM listing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Fully-qualified ARM resource id, used for the delete call.
    pub id: String,

    /// Resource name. Candidate identity is keyed by name.
    pub name: String,

    /// Full ARM resource type, e.g. `Microsoft.Compute/snapshots`.
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Creation timestamp. Only present when the listing was requested with
    /// `$expand=createdTime`; a snapshot without it is never deleted.
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    /// Resource tags. May be absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl SnapshotRecord {
    /// Final segment of the ARM resource type
    /// (`Microsoft.Compute/snapshots` → `snapshots`).
    pub fn type_suffix(&self) -> &str {
        self.resource_type
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_type)
    }
}

/// Lazily-produced, finite stream of snapshot records. Consumed exactly
/// once; a stream error aborts the whole pass.
pub type SnapshotStream<'a> = BoxStream<'a, Result<SnapshotRecord, ArmError>>;

/// Enumerates snapshot resources in scope, one page at a time.
pub trait SnapshotLister: Send + Sync {
    fn list_snapshots(&self) -> SnapshotStream<'_>;
}

/// Deletes a snapshot and awaits the operation's terminal status.
///
/// Deleting an already-deleted resource is benign from the caller's
/// perspective; the trait makes no attempt to distinguish it.
#[async_trait]
pub trait SnapshotDeleter: Send + Sync {
    async fn delete_snapshot(&self, record: &SnapshotRecord) -> Result<(), ArmError>;
}
