//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// PostgreSQL SSL mode.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (recommended for testing and single-node deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Busy timeout in seconds for concurrent writers.
        #[serde(default = "default_sqlite_busy_timeout_secs")]
        busy_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host (e.g., "localhost" or "db.example.com").
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer DRYDOCK_METADATA__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds (prevents hung queries).
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/drydock.db"),
            busy_timeout_secs: default_sqlite_busy_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                _ => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
            },
        }
    }
}

fn default_sqlite_busy_timeout_secs() -> Option<u64> {
    Some(5)
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

/// Garbage collector configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GcConfig {
    /// Seconds between collection cycles.
    #[serde(default = "default_gc_interval_secs")]
    pub interval_secs: u64,
    /// Per-request timeout in seconds for remote backend calls.
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    /// Reap containers stuck in the creating state for longer than this
    /// many seconds. Disabled unless set: creating rows belong to their
    /// creator, and reaping them early races an in-flight remote create.
    #[serde(default)]
    pub reap_creating_after_secs: Option<u64>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_gc_interval_secs(),
            remote_timeout_secs: default_remote_timeout_secs(),
            reap_creating_after_secs: None,
        }
    }
}

impl GcConfig {
    /// Get the cycle interval as a std::time::Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Get the remote call timeout as a std::time::Duration.
    pub fn remote_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.remote_timeout_secs)
    }

    /// Validate GC configuration for dangerous settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("gc.interval_secs must be greater than zero".to_string());
        }
        if self.remote_timeout_secs == 0 {
            return Err("gc.remote_timeout_secs must be greater than zero".to_string());
        }
        if self.reap_creating_after_secs == Some(0) {
            return Err(
                "gc.reap_creating_after_secs must be greater than zero when set".to_string(),
            );
        }
        Ok(())
    }
}

fn default_gc_interval_secs() -> u64 {
    30
}

fn default_remote_timeout_secs() -> u64 {
    10
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Garbage collector configuration.
    #[serde(default)]
    pub gc: GcConfig,
}

impl AppConfig {
    /// Create a test configuration with SQLite metadata and default GC settings.
    ///
    /// **For testing only.**
    pub fn for_testing(db_path: PathBuf) -> Self {
        Self {
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                busy_timeout_secs: default_sqlite_busy_timeout_secs(),
            },
            gc: GcConfig::default(),
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.metadata.validate()?;
        self.gc.validate()?;
        Ok(())
    }
}
