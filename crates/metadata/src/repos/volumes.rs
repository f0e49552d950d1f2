//! Volume repository.

use crate::error::MetadataResult;
use crate::models::{CreatedVolume, CreatingVolume, DestroyingVolume, FoundVolume};
use async_trait::async_trait;

/// Repository for the volume lifecycle state machine.
///
/// Mirrors the container three-phase protocol, parameterized by owner
/// kind: resource cache, base resource type, or parent container.
#[async_trait]
pub trait VolumeRepo: Send + Sync {
    /// Insert a cache volume in state `creating`, uninitialized; content
    /// is populated later and `mark_volume_initialized` flips the flag.
    async fn create_cache_volume(
        &self,
        team_id: i64,
        worker_name: &str,
        resource_cache_id: i64,
    ) -> MetadataResult<CreatingVolume>;

    /// Insert a base-resource-type volume. Initialized immediately: base
    /// images arrive pre-populated.
    async fn create_base_type_volume(
        &self,
        team_id: i64,
        worker_name: &str,
        base_resource_type_id: i64,
    ) -> MetadataResult<CreatingVolume>;

    /// Insert a container-scoped volume with its mount path. The path is
    /// fixed at creation.
    async fn create_container_volume(
        &self,
        team_id: i64,
        worker_name: &str,
        container_id: i64,
        mount_path: &str,
    ) -> MetadataResult<CreatingVolume>;

    /// The concurrent-create protocol for cache volumes: look up an
    /// existing row; if absent, insert; on a uniqueness violation (a
    /// concurrent caller won the race) restart the whole sequence from
    /// the lookup. Bounded retries. Two racing callers resolve to exactly
    /// one persisted row.
    async fn find_or_create_cache_volume(
        &self,
        team_id: i64,
        worker_name: &str,
        resource_cache_id: i64,
    ) -> MetadataResult<FoundVolume>;

    /// Conditional `creating -> created`. `StateConflict` on zero rows.
    async fn mark_volume_created(
        &self,
        volume: &CreatingVolume,
    ) -> MetadataResult<CreatedVolume>;

    /// Flip the `initialized` flag once content has been populated.
    /// Idempotent at the SQL level; the flag never flips back.
    async fn mark_volume_initialized(&self, volume: &CreatedVolume) -> MetadataResult<()>;

    /// All `created` volumes mounted into the container, each carrying
    /// the worker address resolved at query time.
    async fn find_volumes_for_container(
        &self,
        container_id: i64,
    ) -> MetadataResult<Vec<CreatedVolume>>;

    /// Look up the volume for a specific mount point, dispatching on its
    /// current state. Used to avoid duplicate volume creation. Returns
    /// `None` when no usable row exists (absent or already destroying).
    async fn find_container_volume(
        &self,
        team_id: i64,
        worker_name: &str,
        container_id: i64,
        mount_path: &str,
    ) -> MetadataResult<Option<FoundVolume>>;

    /// Initialized volumes with no owning association, partitioned by
    /// state. The garbage collector's primary input for volumes.
    async fn find_orphaned_volumes(
        &self,
    ) -> MetadataResult<(Vec<CreatedVolume>, Vec<DestroyingVolume>)>;

    /// Conditional `created -> destroying`. `StateConflict` means another
    /// actor is already destroying it.
    async fn begin_volume_destroy(
        &self,
        volume: &CreatedVolume,
    ) -> MetadataResult<DestroyingVolume>;

    /// Delete the row once remote deletion is confirmed. Returns `false`
    /// if another actor already finalized it.
    async fn finalize_volume_destroy(&self, volume: &DestroyingVolume) -> MetadataResult<bool>;
}
