//! One collection cycle over containers and volumes.

use drydock_core::GcConfig;
use drydock_metadata::models::{DestroyingContainer, DestroyingVolume};
use drydock_metadata::{MetadataError, MetadataResult, MetadataStore};
use drydock_remote::{BackendConnector, BackendError, WorkerBackend};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Counters for one collection cycle.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CycleStats {
    /// Created containers transitioned to destroying by the set-based sweep.
    pub containers_marked: u64,
    /// Abandoned creating containers transitioned to destroying.
    pub stale_creating_marked: u64,
    /// Container rows removed after confirmed remote deletion.
    pub containers_reaped: u64,
    /// Orphaned created volumes transitioned to destroying.
    pub volumes_marked: u64,
    /// Volume rows removed after confirmed remote deletion.
    pub volumes_reaped: u64,
    /// Resources left marked because their worker was unknown or had no
    /// address; retried next cycle.
    pub skipped: u64,
    /// Per-resource failures (remote or storage); retried next cycle.
    pub errors: u64,
}

/// Why a single resource could not be reaped this cycle.
#[derive(Debug, Error)]
enum ReapError {
    #[error(transparent)]
    Store(#[from] MetadataError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Drives two-phase destruction of containers and volumes.
///
/// Backend clients are acquired through the connector per cycle, keyed by
/// worker address, and discarded when the cycle ends.
pub struct Collector {
    store: Arc<dyn MetadataStore>,
    connector: Arc<dyn BackendConnector>,
    config: GcConfig,
}

impl Collector {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        connector: Arc<dyn BackendConnector>,
        config: GcConfig,
    ) -> Self {
        Self {
            store,
            connector,
            config,
        }
    }

    /// Run one collection cycle. A single resource's failure never aborts
    /// the cycle for other resources; failures are counted and logged,
    /// and the resource stays marked for the next cycle.
    pub async fn run_cycle(&self) -> MetadataResult<CycleStats> {
        let mut stats = CycleStats::default();
        let mut clients: HashMap<String, Arc<dyn WorkerBackend>> = HashMap::new();

        stats.containers_marked = self.store.mark_build_containers_for_deletion().await?;

        if let Some(secs) = self.config.reap_creating_after_secs {
            let cutoff = OffsetDateTime::now_utc() - time::Duration::seconds(secs as i64);
            stats.stale_creating_marked =
                self.store.mark_stale_creating_containers(cutoff).await?;
        }

        // Containers before volumes: reaping a container is what strands
        // its mounted volumes for the volume pass to pick up.
        for container in self.store.find_destroying_containers().await? {
            match self.reap_container(&container, &mut clients).await {
                Ok(true) => stats.containers_reaped += 1,
                Ok(false) => stats.skipped += 1,
                Err(err) => {
                    stats.errors += 1;
                    tracing::warn!(
                        worker = %container.worker_name,
                        handle = %container.handle,
                        error = %err,
                        "container reap failed; will retry next cycle"
                    );
                }
            }
        }

        let (created_orphans, mut to_reap) = self.store.find_orphaned_volumes().await?;

        for volume in created_orphans {
            match self.store.begin_volume_destroy(&volume).await {
                Ok(destroying) => {
                    stats.volumes_marked += 1;
                    to_reap.push(destroying);
                }
                // Another actor is already destroying it.
                Err(err) if err.is_state_conflict() => {}
                Err(err) => {
                    stats.errors += 1;
                    tracing::warn!(
                        worker = %volume.worker_name,
                        handle = %volume.handle,
                        error = %err,
                        "failed to mark orphaned volume; will retry next cycle"
                    );
                }
            }
        }

        for volume in to_reap {
            match self.reap_volume(&volume, &mut clients).await {
                Ok(true) => stats.volumes_reaped += 1,
                Ok(false) => stats.skipped += 1,
                Err(err) => {
                    stats.errors += 1;
                    tracing::warn!(
                        worker = %volume.worker_name,
                        handle = %volume.handle,
                        error = %err,
                        "volume reap failed; will retry next cycle"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Returns `Ok(true)` when the row is gone, `Ok(false)` when the
    /// resource was skipped because its worker is unknown or unreachable.
    async fn reap_container(
        &self,
        container: &DestroyingContainer,
        clients: &mut HashMap<String, Arc<dyn WorkerBackend>>,
    ) -> Result<bool, ReapError> {
        let Some(backend) = self.backend_for(&container.worker_name, clients).await? else {
            return Ok(false);
        };

        backend.destroy_container(&container.handle).await?;

        let removed = self.store.finalize_container_destroy(container).await?;
        if !removed {
            tracing::debug!(
                handle = %container.handle,
                "container already finalized by another actor"
            );
        }
        Ok(true)
    }

    async fn reap_volume(
        &self,
        volume: &DestroyingVolume,
        clients: &mut HashMap<String, Arc<dyn WorkerBackend>>,
    ) -> Result<bool, ReapError> {
        let Some(backend) = self.backend_for(&volume.worker_name, clients).await? else {
            return Ok(false);
        };

        backend.destroy_volume(&volume.handle).await?;

        let removed = self.store.finalize_volume_destroy(volume).await?;
        if !removed {
            tracing::debug!(
                handle = %volume.handle,
                "volume already finalized by another actor"
            );
        }
        Ok(true)
    }

    /// Resolve a worker to a backend client, reusing clients within the
    /// cycle. `None` means the worker is unknown or has no address; the
    /// resource stays marked and is retried on a later cycle.
    async fn backend_for(
        &self,
        worker_name: &str,
        clients: &mut HashMap<String, Arc<dyn WorkerBackend>>,
    ) -> Result<Option<Arc<dyn WorkerBackend>>, ReapError> {
        let Some(worker) = self.store.get_worker(worker_name).await? else {
            tracing::debug!(worker = worker_name, "worker not registered; leaving resource marked");
            return Ok(None);
        };

        let Some(addr) = worker.addr else {
            tracing::debug!(worker = worker_name, "worker has no address; leaving resource marked");
            return Ok(None);
        };

        if let Some(client) = clients.get(&addr) {
            return Ok(Some(client.clone()));
        }

        let client = self.connector.connect(&addr)?;
        clients.insert(addr, client.clone());
        Ok(Some(client))
    }
}
