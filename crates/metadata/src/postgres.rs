//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{ContainerRepo, VolumeRepo, WorkerRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use drydock_core::{ContainerMetadata, PgSslMode};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, enabling better
    /// secret management (e.g., passwords via environment variables).
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Internal: Connect to PostgreSQL with the given options.
    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        // Bound query time so a hung remote-marking sweep cannot pin a
        // pool connection forever.
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared
        // statement, so we split the schema and execute each separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQLSTATE 23503 = foreign_key_violation, 23505 = unique_violation.
fn map_pg_insert_error(err: sqlx::Error, context: &str) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("23503") => return MetadataError::ReferenceStale(context.to_string()),
            Some("23505") => return MetadataError::Duplicate(context.to_string()),
            _ => {}
        }
    }
    MetadataError::Database(err)
}

/// Retries for the cache-volume find-or-create protocol before giving up.
const FIND_OR_CREATE_RETRIES: usize = 3;

impl PostgresStore {
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
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO containers (handle, worker_name, state, resource_config_id, resource_cache_id, build_id, plan_id, meta_type, step_name, created_at) \
             VALUES ($1, $2, 'creating', $3, $4, $5, $6, $7, $8, $9) RETURNING id",
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
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_pg_insert_error(e, context))?;

        Ok(CreatingContainer {
            id,
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
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO volumes (handle, team_id, worker_name, state, initialized, path, resource_cache_id, base_resource_type_id, container_id, created_at) \
             VALUES ($1, $2, $3, 'creating', $4, $5, $6, $7, $8, $9) RETURNING id",
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
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_pg_insert_error(e, context))?;

        Ok(CreatingVolume {
            id,
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
             WHERE v.team_id = $1 AND v.worker_name = $2 AND v.resource_cache_id = $3",
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
impl ContainerRepo for PostgresStore {
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
            "UPDATE containers SET state = 'created' WHERE id = $1 AND state = 'creating'",
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
            "SELECT id, worker_name FROM containers WHERE handle = $1 AND state = 'created'",
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
            "UPDATE containers SET state = 'destroying' WHERE id = $1 AND state = 'created'",
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
        let result = sqlx::query("DELETE FROM containers WHERE id = $1 AND state = 'destroying'")
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
             WHERE state = 'creating' AND created_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_destroying_containers(&self) -> MetadataResult<Vec<DestroyingContainer>> {
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
impl VolumeRepo for PostgresStore {
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
        // Lookup-or-insert with restart on conflict: a concurrent caller
        // may win the insert between our lookup and ours, in which case
        // the unique index rejects us and the next lookup finds their row.
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

    async fn mark_volume_created(&self, volume: &CreatingVolume) -> MetadataResult<CreatedVolume> {
        let result = sqlx::query(
            "UPDATE volumes SET state = 'created' WHERE id = $1 AND state = 'creating'",
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
            "SELECT addr FROM workers WHERE name = $1",
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
        let result = sqlx::query("UPDATE volumes SET initialized = TRUE WHERE id = $1")
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
        let rows = sqlx::query_as::<_, (i64, String, Option<String>, String, Option<String>)>(
            "SELECT v.id, v.handle, v.path, v.worker_name, w.addr \
             FROM volumes v LEFT JOIN workers w ON v.worker_name = w.name \
             WHERE v.state = 'created' AND v.container_id = $1 \
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
             WHERE v.team_id = $1 AND v.worker_name = $2 AND v.container_id = $3 AND v.path = $4",
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
        let rows = sqlx::query_as::<_, (i64, String, String, Option<String>, String, Option<String>)>(
            "SELECT v.id, v.handle, v.state, v.path, v.worker_name, w.addr \
             FROM volumes v LEFT JOIN workers w ON v.worker_name = w.name \
             WHERE v.initialized = TRUE \
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
            "UPDATE volumes SET state = 'destroying' WHERE id = $1 AND state = 'created'",
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

    async fn finalize_volume_destroy(&self, volume: &DestroyingVolume) -> MetadataResult<bool> {
        let result = sqlx::query("DELETE FROM volumes WHERE id = $1 AND state = 'destroying'")
            .bind(volume.id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WorkerRepo for PostgresStore {
    async fn save_worker(&self, worker: &WorkerRow) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO workers (name, addr, state, updated_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (name) DO UPDATE SET \
                 addr = EXCLUDED.addr, \
                 state = EXCLUDED.state, \
                 updated_at = EXCLUDED.updated_at",
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
        let row = sqlx::query_as::<_, WorkerRow>("SELECT * FROM workers WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn land_worker(&self, name: &str) -> MetadataResult<()> {
        let result =
            sqlx::query("UPDATE workers SET state = 'landed', updated_at = $1 WHERE name = $2")
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
