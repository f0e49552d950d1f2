//! Test fixtures seeding the collaborator tables the lifecycle FKs point at.

use drydock_metadata::models::WorkerRow;
use sqlx::{Pool, Sqlite};
use time::OffsetDateTime;

/// Build a running worker record with an address.
#[allow(dead_code)]
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
pub async fn insert_resource_cache(
    pool: &Pool<Sqlite>,
    resource_config_id: i64,
    version: &str,
) -> i64 {
    sqlx::query("INSERT INTO resource_caches (resource_config_id, version) VALUES (?, ?)")
        .bind(resource_config_id)
        .bind(version)
        .execute(pool)
        .await
        .expect("insert resource cache")
        .last_insert_rowid()
}

#[allow(dead_code)]
pub async fn insert_base_resource_type(pool: &Pool<Sqlite>, name: &str) -> i64 {
    sqlx::query("INSERT INTO base_resource_types (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .expect("insert base resource type")
        .last_insert_rowid()
}

#[allow(dead_code)]
pub async fn insert_pipeline(pool: &Pool<Sqlite>, team_id: i64, name: &str) -> i64 {
    sqlx::query("INSERT INTO pipelines (team_id, name) VALUES (?, ?)")
        .bind(team_id)
        .bind(name)
        .execute(pool)
        .await
        .expect("insert pipeline")
        .last_insert_rowid()
}

#[allow(dead_code)]
pub async fn insert_job(pool: &Pool<Sqlite>, pipeline_id: i64, name: &str) -> i64 {
    sqlx::query("INSERT INTO jobs (pipeline_id, name) VALUES (?, ?)")
        .bind(pipeline_id)
        .bind(name)
        .execute(pool)
        .await
        .expect("insert job")
        .last_insert_rowid()
}

#[allow(dead_code)]
pub async fn insert_build(pool: &Pool<Sqlite>, job_id: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO builds (job_id, status) VALUES (?, 'succeeded')")
        .bind(job_id)
        .execute(pool)
        .await
        .expect("insert build")
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

#[allow(dead_code)]
pub async fn delete_base_resource_type(pool: &Pool<Sqlite>, id: i64) {
    sqlx::query("DELETE FROM base_resource_types WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .expect("delete base resource type");
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

/// Read a volume's state column directly.
#[allow(dead_code)]
pub async fn volume_state(pool: &Pool<Sqlite>, id: i64) -> Option<String> {
    sqlx::query_scalar("SELECT state FROM volumes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .expect("query volume state")
}

/// Read a volume's initialized flag directly.
#[allow(dead_code)]
pub async fn volume_initialized(pool: &Pool<Sqlite>, id: i64) -> Option<bool> {
    sqlx::query_scalar("SELECT initialized FROM volumes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .expect("query volume initialized")
}
