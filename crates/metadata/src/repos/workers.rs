//! Worker registry repository.
//!
//! Workers are referenced, not owned: the core consults the registry to
//! route remote deletes and treats a missing or address-less worker as a
//! transient condition, never fatal.

use crate::error::MetadataResult;
use crate::models::WorkerRow;
use async_trait::async_trait;

/// Repository for worker registry lookups.
#[async_trait]
pub trait WorkerRepo: Send + Sync {
    /// Upsert a worker record. Registration plumbing lives elsewhere;
    /// this is the storage operation it bottoms out in.
    async fn save_worker(&self, worker: &WorkerRow) -> MetadataResult<()>;

    /// Look up a worker by name. Absence is `None`, not an error.
    async fn get_worker(&self, name: &str) -> MetadataResult<Option<WorkerRow>>;

    /// Drain/retire a worker. Its resources remain until the collector
    /// reaps them. `NotFound` if no such worker exists.
    async fn land_worker(&self, name: &str) -> MetadataResult<()>;
}
