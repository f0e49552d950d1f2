//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ContainerRepo, VolumeRepo, WorkerRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ContainerRepo + VolumeRepo + WorkerRepo + Send + Sync {
    /// Create or update the database schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let busy_timeout_secs = busy_timeout_secs.unwrap_or(5);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Config(format!("creating {parent:?}: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Required for ON DELETE SET NULL to strand resources when
            // their owner rows are removed.
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures when creators
            // and the collector write concurrently.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map an insert failure to the typed error the lifecycle protocol needs:
/// a vanished FK target is `ReferenceStale`, a uniqueness race is
/// `Duplicate`, anything else passes through as a storage error.
fn map_sqlite_insert_error(err: sqlx::Error, context: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = err {
        let msg = db_err.message();
        if msg.contains("FOREIGN KEY constraint") {
            return MetadataError::ReferenceStale(context.to_string());
        }
        if msg.contains("UNIQUE constraint") {
            return MetadataError::Duplicate(context.to_string());
        }
    }
    MetadataError::Database(err)
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use drydock_core::ContainerMetadata;
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// Retries for the cache-volume find-or-create protocol before giving up.
    const FIND_OR_CREATE_RETRIES: usize = 3;

    impl SqliteStore {
        #[allow(clippy::too_many_arguments)]
        async fn insert_container(
            &self,
            worker_name: &str,
            resource_config_id: Option<i64>,
            resource_cache_id: Option<i64>,
            build_id: Option<i64>,
            plan_id: Option<&str>,
            meta_type: &str,
            step_name: &str,
            context: &str,
        ) -> MetadataResult<CreatingContainer> {
            let handle = Uuid::new_v4().to_string();
            let result = sqlx::query(
                "INSERT INTO containers (handle, worker_name, state, resource_config_id, resource_cache_id, build_id, plan_id, meta_type, step_name, created_at) \
                 VALUES (?, ?, 'creating', ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&handle)
            .bind(worker_name)
            .bind(resource_config_id)
            .bind(resource_cache_id)
            .bind(build_id)
            .bind(plan_id)
            .bind(meta_type)
            .bind(step_name)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlite_insert_error(e, context))?;

            Ok(CreatingContainer {
                id: result.last_insert_rowid(),
                handle,
                worker_name: worker_name.to_string(),
            })
        }

        #[allow(clippy::too_many_arguments)]
        async fn insert_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            initialized: bool,
            path: Option<&str>,
            resource_cache_id: Option<i64>,
            base_resource_type_id: Option<i64>,
            container_id: Option<i64>,
            context: &str,
        ) -> MetadataResult<CreatingVolume> {
            let handle = Uuid::new_v4().to_string();
            let result = sqlx::query(
                "INSERT INTO volumes (handle, team_id, worker_name, state, initialized, path, resource_cache_id, base_resource_type_id, container_id, created_at) \
                 VALUES (?, ?, ?, 'creating', ?, ?, ?, ?, ?, ?)",
            )
            .bind(&handle)
            .bind(team_id)
            .bind(worker_name)
            .bind(initialized)
            .bind(path)
            .bind(resource_cache_id)
            .bind(base_resource_type_id)
            .bind(container_id)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlite_insert_error(e, context))?;

            Ok(CreatingVolume {
                id: result.last_insert_rowid(),
                handle,
                worker_name: worker_name.to_string(),
                path: path.map(str::to_string),
            })
        }

        async fn lookup_cache_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            resource_cache_id: i64,
        ) -> MetadataResult<Option<FoundVolume>> {
            let row = sqlx::query_as::<_, (i64, String, String, Option<String>, Option<String>)>(
                "SELECT v.id, v.handle, v.state, v.path, w.addr \
                 FROM volumes v LEFT JOIN workers w ON v.worker_name = w.name \
                 WHERE v.team_id = ? AND v.worker_name = ? AND v.resource_cache_id = ?",
            )
            .bind(team_id)
            .bind(worker_name)
            .bind(resource_cache_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.and_then(|(id, handle, state, path, worker_addr)| {
                dispatch_found_volume(id, handle, &state, path, worker_name, worker_addr)
            }))
        }
    }

    /// Partition a looked-up volume row by state. Destroying rows are
    /// unusable for callers and surface as absent.
    fn dispatch_found_volume(
        id: i64,
        handle: String,
        state: &str,
        path: Option<String>,
        worker_name: &str,
        worker_addr: Option<String>,
    ) -> Option<FoundVolume> {
        match state {
            "creating" => Some(FoundVolume::Creating(CreatingVolume {
                id,
                handle,
                worker_name: worker_name.to_string(),
                path,
            })),
            "created" => Some(FoundVolume::Created(CreatedVolume {
                id,
                handle,
                worker_name: worker_name.to_string(),
                worker_addr,
                path,
            })),
            _ => None,
        }
    }

    #[async_trait]
    impl ContainerRepo for SqliteStore {
        async fn create_check_container(
            &self,
            worker_name: &str,
            resource_config_id: i64,
            step_name: &str,
        ) -> MetadataResult<CreatingContainer> {
            self.insert_container(
                worker_name,
                Some(resource_config_id),
                None,
                None,
                None,
                "check",
                step_name,
                "worker or resource config vanished during check container insert",
            )
            .await
        }

        async fn create_get_container(
            &self,
            worker_name: &str,
            resource_cache_id: i64,
            step_name: &str,
        ) -> MetadataResult<CreatingContainer> {
            self.insert_container(
                worker_name,
                None,
                Some(resource_cache_id),
                None,
                None,
                "get",
                step_name,
                "worker or resource cache vanished during get container insert",
            )
            .await
        }

        async fn create_task_container(
            &self,
            worker_name: &str,
            build_id: i64,
            plan_id: &str,
            meta: &ContainerMetadata,
        ) -> MetadataResult<CreatingContainer> {
            self.insert_container(
                worker_name,
                None,
                None,
                Some(build_id),
                Some(plan_id),
                &meta.step_type,
                &meta.step_name,
                "worker or build vanished during task container insert",
            )
            .await
        }

        async fn mark_container_created(
            &self,
            container: &CreatingContainer,
        ) -> MetadataResult<CreatedContainer> {
            let result = sqlx::query(
                "UPDATE containers SET state = 'created' WHERE id = ? AND state = 'creating'",
            )
            .bind(container.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::StateConflict {
                    resource: "container",
                    id: container.id,
                    expected: "creating",
                });
            }

            Ok(CreatedContainer {
                id: container.id,
                handle: container.handle.clone(),
                worker_name: container.worker_name.clone(),
            })
        }

        async fn find_created_container(
            &self,
            handle: &str,
        ) -> MetadataResult<Option<CreatedContainer>> {
            let row = sqlx::query_as::<_, (i64, String)>(
                "SELECT id, worker_name FROM containers WHERE handle = ? AND state = 'created'",
            )
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(|(id, worker_name)| CreatedContainer {
                id,
                handle: handle.to_string(),
                worker_name,
            }))
        }

        async fn begin_container_destroy(
            &self,
            container: &CreatedContainer,
        ) -> MetadataResult<DestroyingContainer> {
            let result = sqlx::query(
                "UPDATE containers SET state = 'destroying' WHERE id = ? AND state = 'created'",
            )
            .bind(container.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::StateConflict {
                    resource: "container",
                    id: container.id,
                    expected: "created",
                });
            }

            Ok(DestroyingContainer {
                id: container.id,
                handle: container.handle.clone(),
                worker_name: container.worker_name.clone(),
            })
        }

        async fn finalize_container_destroy(
            &self,
            container: &DestroyingContainer,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "DELETE FROM containers WHERE id = ? AND state = 'destroying'",
            )
            .bind(container.id)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected() > 0)
        }

        async fn mark_build_containers_for_deletion(&self) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            // Build containers whose build has been superseded by a newer
            // build of the same job. One-off builds (no job) keep theirs.
            let superseded = sqlx::query(
                "UPDATE containers SET state = 'destroying' \
                 WHERE state = 'created' \
                   AND build_id IN ( \
                       SELECT b.id FROM builds b \
                       WHERE b.job_id IS NOT NULL \
                         AND b.id NOT IN ( \
                             SELECT MAX(b2.id) FROM builds b2 \
                             WHERE b2.job_id IS NOT NULL GROUP BY b2.job_id \
                         ) \
                   )",
            )
            .execute(&mut *tx)
            .await?;

            // Containers stranded by owner deletion: every association FK
            // was nulled out from under them.
            let stranded = sqlx::query(
                "UPDATE containers SET state = 'destroying' \
                 WHERE state = 'created' \
                   AND resource_config_id IS NULL \
                   AND resource_cache_id IS NULL \
                   AND build_id IS NULL",
            )
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            Ok(superseded.rows_affected() + stranded.rows_affected())
        }

        async fn mark_stale_creating_containers(
            &self,
            older_than: OffsetDateTime,
        ) -> MetadataResult<u64> {
            let result = sqlx::query(
                "UPDATE containers SET state = 'destroying' \
                 WHERE state = 'creating' AND created_at < ?",
            )
            .bind(older_than)
            .execute(&self.pool)
            .await?;

            Ok(result.rows_affected())
        }

        async fn find_destroying_containers(
            &self,
        ) -> MetadataResult<Vec<DestroyingContainer>> {
            let rows = sqlx::query_as::<_, (i64, String, String)>(
                "SELECT id, handle, worker_name FROM containers \
                 WHERE state = 'destroying' ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .into_iter()
                .map(|(id, handle, worker_name)| DestroyingContainer {
                    id,
                    handle,
                    worker_name,
                })
                .collect())
        }
    }

    #[async_trait]
    impl VolumeRepo for SqliteStore {
        async fn create_cache_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            resource_cache_id: i64,
        ) -> MetadataResult<CreatingVolume> {
            self.insert_volume(
                team_id,
                worker_name,
                false,
                None,
                Some(resource_cache_id),
                None,
                None,
                "worker or resource cache vanished during cache volume insert",
            )
            .await
        }

        async fn create_base_type_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            base_resource_type_id: i64,
        ) -> MetadataResult<CreatingVolume> {
            self.insert_volume(
                team_id,
                worker_name,
                true,
                None,
                None,
                Some(base_resource_type_id),
                None,
                "worker or base resource type vanished during base type volume insert",
            )
            .await
        }

        async fn create_container_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            container_id: i64,
            mount_path: &str,
        ) -> MetadataResult<CreatingVolume> {
            self.insert_volume(
                team_id,
                worker_name,
                true,
                Some(mount_path),
                None,
                None,
                Some(container_id),
                "worker or container vanished during container volume insert",
            )
            .await
        }

        async fn find_or_create_cache_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            resource_cache_id: i64,
        ) -> MetadataResult<FoundVolume> {
            // Lookup-or-insert with restart on conflict: a concurrent
            // caller may win the insert between our lookup and ours, in
            // which case the unique index rejects us and the next lookup
            // finds their row.
            for _ in 0..FIND_OR_CREATE_RETRIES {
                if let Some(found) = self
                    .lookup_cache_volume(team_id, worker_name, resource_cache_id)
                    .await?
                {
                    return Ok(found);
                }

                match self
                    .create_cache_volume(team_id, worker_name, resource_cache_id)
                    .await
                {
                    Ok(creating) => return Ok(FoundVolume::Creating(creating)),
                    Err(MetadataError::Duplicate(_)) => continue,
                    Err(e) => return Err(e),
                }
            }

            Err(MetadataError::Internal(format!(
                "cache volume find-or-create did not converge for cache {resource_cache_id} on worker {worker_name}"
            )))
        }

        async fn mark_volume_created(
            &self,
            volume: &CreatingVolume,
        ) -> MetadataResult<CreatedVolume> {
            let result = sqlx::query(
                "UPDATE volumes SET state = 'created' WHERE id = ? AND state = 'creating'",
            )
            .bind(volume.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::StateConflict {
                    resource: "volume",
                    id: volume.id,
                    expected: "creating",
                });
            }

            let worker_addr = sqlx::query_scalar::<_, Option<String>>(
                "SELECT addr FROM workers WHERE name = ?",
            )
            .bind(&volume.worker_name)
            .fetch_optional(&self.pool)
            .await?
            .flatten();

            Ok(CreatedVolume {
                id: volume.id,
                handle: volume.handle.clone(),
                worker_name: volume.worker_name.clone(),
                worker_addr,
                path: volume.path.clone(),
            })
        }

        async fn mark_volume_initialized(&self, volume: &CreatedVolume) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE volumes SET initialized = 1 WHERE id = ?")
                .bind(volume.id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("volume {}", volume.id)));
            }
            Ok(())
        }

        async fn find_volumes_for_container(
            &self,
            container_id: i64,
        ) -> MetadataResult<Vec<CreatedVolume>> {
            let rows =
                sqlx::query_as::<_, (i64, String, Option<String>, String, Option<String>)>(
                    "SELECT v.id, v.handle, v.path, v.worker_name, w.addr \
                     FROM volumes v LEFT JOIN workers w ON v.worker_name = w.name \
                     WHERE v.state = 'created' AND v.container_id = ? \
                     ORDER BY v.id",
                )
                .bind(container_id)
                .fetch_all(&self.pool)
                .await?;

            Ok(rows
                .into_iter()
                .map(|(id, handle, path, worker_name, worker_addr)| CreatedVolume {
                    id,
                    handle,
                    worker_name,
                    worker_addr,
                    path,
                })
                .collect())
        }

        async fn find_container_volume(
            &self,
            team_id: i64,
            worker_name: &str,
            container_id: i64,
            mount_path: &str,
        ) -> MetadataResult<Option<FoundVolume>> {
            let row = sqlx::query_as::<_, (i64, String, String, Option<String>, Option<String>)>(
                "SELECT v.id, v.handle, v.state, v.path, w.addr \
                 FROM volumes v LEFT JOIN workers w ON v.worker_name = w.name \
                 WHERE v.team_id = ? AND v.worker_name = ? AND v.container_id = ? AND v.path = ?",
            )
            .bind(team_id)
            .bind(worker_name)
            .bind(container_id)
            .bind(mount_path)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.and_then(|(id, handle, state, path, worker_addr)| {
                dispatch_found_volume(id, handle, &state, path, worker_name, worker_addr)
            }))
        }

        async fn find_orphaned_volumes(
            &self,
        ) -> MetadataResult<(Vec<CreatedVolume>, Vec<DestroyingVolume>)> {
            let rows = sqlx::query_as::<
                _,
                (i64, String, String, Option<String>, String, Option<String>),
            >(
                "SELECT v.id, v.handle, v.state, v.path, v.worker_name, w.addr \
                 FROM volumes v LEFT JOIN workers w ON v.worker_name = w.name \
                 WHERE v.initialized = 1 \
                   AND v.resource_cache_id IS NULL \
                   AND v.base_resource_type_id IS NULL \
                   AND v.container_id IS NULL \
                 ORDER BY v.id",
            )
            .fetch_all(&self.pool)
            .await?;

            let mut created = Vec::new();
            let mut destroying = Vec::new();

            for (id, handle, state, path, worker_name, worker_addr) in rows {
                match state.as_str() {
                    "created" => created.push(CreatedVolume {
                        id,
                        handle,
                        worker_name,
                        worker_addr,
                        path,
                    }),
                    "destroying" => destroying.push(DestroyingVolume {
                        id,
                        handle,
                        worker_name,
                        worker_addr,
                    }),
                    // Creating rows belong to their creator even when
                    // orphaned; the abandonment sweep handles those.
                    _ => {}
                }
            }

            Ok((created, destroying))
        }

        async fn begin_volume_destroy(
            &self,
            volume: &CreatedVolume,
        ) -> MetadataResult<DestroyingVolume> {
            let result = sqlx::query(
                "UPDATE volumes SET state = 'destroying' WHERE id = ? AND state = 'created'",
            )
            .bind(volume.id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::StateConflict {
                    resource: "volume",
                    id: volume.id,
                    expected: "created",
                });
            }

            Ok(DestroyingVolume {
                id: volume.id,
                handle: volume.handle.clone(),
                worker_name: volume.worker_name.clone(),
                worker_addr: volume.worker_addr.clone(),
            })
        }

        async fn finalize_volume_destroy(
            &self,
            volume: &DestroyingVolume,
        ) -> MetadataResult<bool> {
            let result =
                sqlx::query("DELETE FROM volumes WHERE id = ? AND state = 'destroying'")
                    .bind(volume.id)
                    .execute(&self.pool)
                    .await?;

            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl WorkerRepo for SqliteStore {
        async fn save_worker(&self, worker: &WorkerRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO workers (name, addr, state, updated_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(name) DO UPDATE SET \
                     addr = excluded.addr, \
                     state = excluded.state, \
                     updated_at = excluded.updated_at",
            )
            .bind(&worker.name)
            .bind(&worker.addr)
            .bind(&worker.state)
            .bind(worker.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_worker(&self, name: &str) -> MetadataResult<Option<WorkerRow>> {
            let row = sqlx::query_as::<_, WorkerRow>("SELECT * FROM workers WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn land_worker(&self, name: &str) -> MetadataResult<()> {
            let result =
                sqlx::query("UPDATE workers SET state = 'landed', updated_at = ? WHERE name = ?")
                    .bind(OffsetDateTime::now_utc())
                    .bind(name)
                    .execute(&self.pool)
                    .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("worker {name}")));
            }
            Ok(())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Teams
CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Worker registry. Referenced by containers and volumes, owned elsewhere.
CREATE TABLE IF NOT EXISTS workers (
    name TEXT PRIMARY KEY,
    addr TEXT,
    state TEXT NOT NULL DEFAULT 'running',
    updated_at TEXT NOT NULL
);

-- Build-plan universe referenced by task containers.
CREATE TABLE IF NOT EXISTS pipelines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE (team_id, name)
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_id INTEGER NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    UNIQUE (pipeline_id, name)
);

CREATE TABLE IF NOT EXISTS builds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER REFERENCES jobs(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'pending'
);
CREATE INDEX IF NOT EXISTS idx_builds_job ON builds(job_id);

-- Resource universe referenced by check/get containers and volumes.
CREATE TABLE IF NOT EXISTS resource_configs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_hash TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS resource_caches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_config_id INTEGER NOT NULL REFERENCES resource_configs(id) ON DELETE CASCADE,
    version TEXT NOT NULL,
    UNIQUE (resource_config_id, version)
);

CREATE TABLE IF NOT EXISTS base_resource_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Containers. Handle is assigned inside the creating transaction, so a
-- visible row always has one. Association FKs are ON DELETE SET NULL:
-- deleting an owner strands the container for the collector to sweep.
CREATE TABLE IF NOT EXISTS containers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    handle TEXT NOT NULL UNIQUE,
    worker_name TEXT NOT NULL REFERENCES workers(name),
    state TEXT NOT NULL DEFAULT 'creating',
    resource_config_id INTEGER REFERENCES resource_configs(id) ON DELETE SET NULL,
    resource_cache_id INTEGER REFERENCES resource_caches(id) ON DELETE SET NULL,
    build_id INTEGER REFERENCES builds(id) ON DELETE SET NULL,
    plan_id TEXT,
    meta_type TEXT,
    step_name TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_containers_state ON containers(state);
CREATE INDEX IF NOT EXISTS idx_containers_worker ON containers(worker_name);

-- Volumes.
CREATE TABLE IF NOT EXISTS volumes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    handle TEXT NOT NULL UNIQUE,
    team_id INTEGER NOT NULL REFERENCES teams(id),
    worker_name TEXT NOT NULL REFERENCES workers(name),
    state TEXT NOT NULL DEFAULT 'creating',
    initialized INTEGER NOT NULL DEFAULT 0,
    path TEXT,
    resource_cache_id INTEGER REFERENCES resource_caches(id) ON DELETE SET NULL,
    base_resource_type_id INTEGER REFERENCES base_resource_types(id) ON DELETE SET NULL,
    container_id INTEGER REFERENCES containers(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_volumes_state ON volumes(state);
CREATE INDEX IF NOT EXISTS idx_volumes_container ON volumes(container_id);
-- One cache volume per logical cache per worker.
CREATE UNIQUE INDEX IF NOT EXISTS idx_volumes_cache_per_worker
    ON volumes(team_id, worker_name, resource_cache_id)
    WHERE resource_cache_id IS NOT NULL;
-- One volume per container mount point.
CREATE UNIQUE INDEX IF NOT EXISTS idx_volumes_container_path
    ON volumes(container_id, path)
    WHERE container_id IS NOT NULL;
"#;
