//! Backend trait definitions.

use crate::error::BackendResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to create on the remote side for a container. The handle is
/// assigned by the metadata store before the remote side hears about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub handle: String,
    /// Root filesystem the backend should launch from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rootfs: Option<String>,
    #[serde(default)]
    pub env: Vec<String>,
}

/// What to create on the remote side for a volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub handle: String,
    /// Copy-on-write parent, when the volume derives from another.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_handle: Option<String>,
}

/// The Create/Destroy contract a worker backend exposes.
#[async_trait]
pub trait WorkerBackend: std::fmt::Debug + Send + Sync {
    /// Create a container; returns the handle the backend addresses it by.
    async fn create_container(&self, spec: &ContainerSpec) -> BackendResult<String>;

    /// Destroy a container by handle. A handle already absent on the
    /// remote side is success.
    async fn destroy_container(&self, handle: &str) -> BackendResult<()>;

    /// Create a volume; returns its handle.
    async fn create_volume(&self, spec: &VolumeSpec) -> BackendResult<String>;

    /// Destroy a volume by handle, with the same idempotent semantics as
    /// `destroy_container`.
    async fn destroy_volume(&self, handle: &str) -> BackendResult<()>;
}

/// Maps a worker address to a backend client.
///
/// The garbage collector acquires clients through one of these per cycle
/// and discards them when the cycle ends; nothing caches clients globally.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, addr: &str) -> BackendResult<Arc<dyn WorkerBackend>>;
}
