//! Container repository.

use crate::error::MetadataResult;
use crate::models::{CreatedContainer, CreatingContainer, DestroyingContainer};
use async_trait::async_trait;
use drydock_core::ContainerMetadata;
use time::OffsetDateTime;

/// Repository for the container lifecycle state machine.
///
/// Every mutating operation is a single short transaction built around a
/// conditional update keyed on (id, expected state). Transitions are
/// linearized per row: at most one concurrent actor advances a given row,
/// and losers observe `StateConflict` — "someone else is handling this",
/// not an error to surface to an end user.
#[async_trait]
pub trait ContainerRepo: Send + Sync {
    /// Insert a container for a resource-config check, state `creating`,
    /// with a freshly generated handle.
    ///
    /// Fails with `ReferenceStale` if the worker or resource config no
    /// longer exists; the caller re-resolves its inputs and retries.
    async fn create_check_container(
        &self,
        worker_name: &str,
        resource_config_id: i64,
        step_name: &str,
    ) -> MetadataResult<CreatingContainer>;

    /// Insert a container for a resource fetch into a cache.
    async fn create_get_container(
        &self,
        worker_name: &str,
        resource_cache_id: i64,
        step_name: &str,
    ) -> MetadataResult<CreatingContainer>;

    /// Insert a container for a build plan step.
    async fn create_task_container(
        &self,
        worker_name: &str,
        build_id: i64,
        plan_id: &str,
        meta: &ContainerMetadata,
    ) -> MetadataResult<CreatingContainer>;

    /// Conditional `creating -> created`. Only the component that performed
    /// the remote creation calls this. `StateConflict` if another actor
    /// already transitioned or deleted the row.
    async fn mark_container_created(
        &self,
        container: &CreatingContainer,
    ) -> MetadataResult<CreatedContainer>;

    /// Look up a container by handle, filtered to state `created`.
    /// Absence is `None`, not an error.
    async fn find_created_container(
        &self,
        handle: &str,
    ) -> MetadataResult<Option<CreatedContainer>>;

    /// Conditional `created -> destroying`. `StateConflict` means the
    /// container is already being destroyed elsewhere; callers treat that
    /// as an idempotent no-op.
    async fn begin_container_destroy(
        &self,
        container: &CreatedContainer,
    ) -> MetadataResult<DestroyingContainer>;

    /// Delete the row once remote deletion is confirmed. Returns `false`
    /// (not an error) if another actor already finalized it; destruction
    /// is safe to invoke twice.
    async fn finalize_container_destroy(
        &self,
        container: &DestroyingContainer,
    ) -> MetadataResult<bool>;

    /// Set-based sweep transitioning `created` containers to `destroying`
    /// when their build has been superseded by a newer build of the same
    /// job, or when every owning association is gone. Never touches
    /// `creating` rows. Returns the number of rows marked.
    async fn mark_build_containers_for_deletion(&self) -> MetadataResult<u64>;

    /// Explicit abandonment sweep: transition `creating` rows older than
    /// `older_than` to `destroying`. The cutoff policy lives with the
    /// caller; this never runs unless invoked.
    async fn mark_stale_creating_containers(
        &self,
        older_than: OffsetDateTime,
    ) -> MetadataResult<u64>;

    /// All containers currently marked `destroying`: this cycle's marks
    /// plus leftovers from prior incomplete cycles.
    async fn find_destroying_containers(&self) -> MetadataResult<Vec<DestroyingContainer>>;
}
