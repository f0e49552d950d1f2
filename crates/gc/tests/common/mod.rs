//! Shared collector test harness: SQLite store plus a scripted backend.

use async_trait::async_trait;
use drydock_metadata::models::WorkerRow;
use drydock_metadata::{MetadataStore, SqliteStore};
use drydock_remote::{
    BackendConnector, BackendError, BackendResult, ContainerSpec, VolumeSpec, WorkerBackend,
};
use sqlx::{Pool, Sqlite};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use time::OffsetDateTime;

/// SQLite-backed store in a temp directory.
pub struct TestStore {
    store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

impl TestStore {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("gc.db"), None)
            .await
            .expect("Failed to create store");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        self.store.pool()
    }
}

/// Backend that records destroys and can be told to fail.
#[derive(Default, Debug)]
pub struct FakeBackend {
    destroyed_containers: Mutex<Vec<String>>,
    destroyed_volumes: Mutex<Vec<String>>,
    fail_destroys: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_destroys.store(failing, Ordering::SeqCst);
    }

    pub fn destroyed_containers(&self) -> Vec<String> {
        self.destroyed_containers.lock().unwrap().clone()
    }

    pub fn destroyed_volumes(&self) -> Vec<String> {
        self.destroyed_volumes.lock().unwrap().clone()
    }

    fn check_failure(&self) -> BackendResult<()> {
        if self.fail_destroys.load(Ordering::SeqCst) {
            return Err(BackendError::Remote {
                status: 500,
                detail: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerBackend for FakeBackend {
    async fn create_container(&self, spec: &ContainerSpec) -> BackendResult<String> {
        Ok(spec.handle.clone())
    }

    async fn destroy_container(&self, handle: &str) -> BackendResult<()> {
        self.check_failure()?;
        self.destroyed_containers
            .lock()
            .unwrap()
            .push(handle.to_string());
        Ok(())
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> BackendResult<String> {
        Ok(spec.handle.clone())
    }

    async fn destroy_volume(&self, handle: &str) -> BackendResult<()> {
        self.check_failure()?;
        self.destroyed_volumes
            .lock()
            .unwrap()
            .push(handle.to_string());
        Ok(())
    }
}

/// Connector handing out the same fake for every address, recording which
/// addresses were dialed.
pub struct FakeConnector {
    backend: Arc<FakeBackend>,
    dialed: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(backend: Arc<FakeBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            dialed: Mutex::new(Vec::new()),
        })
    }

    #[allow(dead_code)]
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().unwrap().clone()
    }
}

impl BackendConnector for FakeConnector {
    fn connect(&self, addr: &str) -> BackendResult<Arc<dyn WorkerBackend>> {
        self.dialed.lock().unwrap().push(addr.to_string());
        Ok(self.backend.clone())
    }
}

/// Build a running worker record with an address.
pub fn test_worker(name: &str, addr: &str) -> WorkerRow {
    WorkerRow {
        name: name.to_string(),
        addr: Some(addr.to_string()),
        state: "running".to_string(),
        updated_at: OffsetDateTime::now_utc(),
    }
}

/// Build a worker record with no reachable address.
#[allow(dead_code)]
pub fn addressless_worker(name: &str) -> WorkerRow {
    WorkerRow {
        name: name.to_string(),
        addr: None,
        state: "running".to_string(),
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[allow(dead_code)]
pub async fn insert_team(pool: &Pool<Sqlite>, name: &str) -> i64 {
    sqlx::query("INSERT INTO teams (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .expect("insert team")
        .last_insert_rowid()
}

#[allow(dead_code)]
pub async fn insert_resource_config(pool: &Pool<Sqlite>, source_hash: &str) -> i64 {
    sqlx::query("INSERT INTO resource_configs (source_hash) VALUES (?)")
        .bind(source_hash)
        .execute(pool)
        .await
        .expect("insert resource config")
        .last_insert_rowid()
}

#[allow(dead_code)]
pub async fn delete_resource_config(pool: &Pool<Sqlite>, id: i64) {
    sqlx::query("DELETE FROM resource_configs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .expect("delete resource config");
}

/// Read a container's state column directly.
#[allow(dead_code)]
pub async fn container_state(pool: &Pool<Sqlite>, id: i64) -> Option<String> {
    sqlx::query_scalar("SELECT state FROM containers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .expect("query container state")
}

/// Backdate a container's creation time for abandonment sweeps.
#[allow(dead_code)]
pub async fn backdate_container(pool: &Pool<Sqlite>, id: i64, by: time::Duration) {
    sqlx::query("UPDATE containers SET created_at = ? WHERE id = ?")
        .bind(OffsetDateTime::now_utc() - by)
        .bind(id)
        .execute(pool)
        .await
        .expect("backdate container");
}
