//! Database models mapping to the resource lifecycle schema.

use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// Workers
// =============================================================================

/// Worker record. Referenced by containers and volumes, owned elsewhere.
#[derive(Debug, Clone, FromRow)]
pub struct WorkerRow {
    pub name: String,
    /// Remote backend address. A worker without one is unreachable and is
    /// skipped by the collector until it re-registers.
    pub addr: Option<String>,
    pub state: String,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Containers
// =============================================================================

/// Full container record.
#[derive(Debug, Clone, FromRow)]
pub struct ContainerRow {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
    pub state: String,
    pub resource_config_id: Option<i64>,
    pub resource_cache_id: Option<i64>,
    pub build_id: Option<i64>,
    pub plan_id: Option<String>,
    pub meta_type: Option<String>,
    pub step_name: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Why a container exists, derived from the row's association columns.
///
/// The columns are nullable FKs with ON DELETE SET NULL; an `Unowned`
/// container lost its owner and is garbage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOwner {
    /// Runs a resource-config check.
    Check { resource_config_id: i64 },
    /// Fetches into a resource cache.
    Get { resource_cache_id: i64 },
    /// Runs a build plan step.
    Task { build_id: i64, plan_id: String },
    Unowned,
}

impl ContainerRow {
    pub fn owner(&self) -> ContainerOwner {
        if let Some(resource_config_id) = self.resource_config_id {
            ContainerOwner::Check { resource_config_id }
        } else if let Some(resource_cache_id) = self.resource_cache_id {
            ContainerOwner::Get { resource_cache_id }
        } else if let Some(build_id) = self.build_id {
            ContainerOwner::Task {
                build_id,
                plan_id: self.plan_id.clone().unwrap_or_default(),
            }
        } else {
            ContainerOwner::Unowned
        }
    }
}

/// Container persisted in `creating`: the row exists, the remote side
/// may not. Only its creator may advance it.
#[derive(Debug, Clone)]
pub struct CreatingContainer {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
}

/// Container whose remote creation has been confirmed.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
}

/// Container marked for reclamation; carries what the collector needs to
/// address the remote side.
#[derive(Debug, Clone)]
pub struct DestroyingContainer {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
}

// =============================================================================
// Volumes
// =============================================================================

/// Full volume record.
#[derive(Debug, Clone, FromRow)]
pub struct VolumeRow {
    pub id: i64,
    pub handle: String,
    pub team_id: i64,
    pub worker_name: String,
    pub state: String,
    pub initialized: bool,
    pub path: Option<String>,
    pub resource_cache_id: Option<i64>,
    pub base_resource_type_id: Option<i64>,
    pub container_id: Option<i64>,
    pub created_at: OffsetDateTime,
}

/// Why a volume exists, derived from the row's association columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeOwner {
    /// Holds a resource cache.
    Cache { resource_cache_id: i64 },
    /// Holds an imported base resource type image.
    BaseType { base_resource_type_id: i64 },
    /// Mounted into a container at `path`.
    Container { container_id: i64, path: String },
    Unowned,
}

impl VolumeRow {
    pub fn owner(&self) -> VolumeOwner {
        if let Some(resource_cache_id) = self.resource_cache_id {
            VolumeOwner::Cache { resource_cache_id }
        } else if let Some(base_resource_type_id) = self.base_resource_type_id {
            VolumeOwner::BaseType {
                base_resource_type_id,
            }
        } else if let Some(container_id) = self.container_id {
            VolumeOwner::Container {
                container_id,
                path: self.path.clone().unwrap_or_default(),
            }
        } else {
            VolumeOwner::Unowned
        }
    }

    /// An initialized volume with no owning association is reclaimable
    /// regardless of age.
    pub fn is_orphaned(&self) -> bool {
        self.initialized && self.owner() == VolumeOwner::Unowned
    }
}

/// Volume persisted in `creating`.
#[derive(Debug, Clone)]
pub struct CreatingVolume {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
    pub path: Option<String>,
}

/// Volume whose remote creation has been confirmed. Carries the worker
/// address resolved at query time for remote addressing.
#[derive(Debug, Clone)]
pub struct CreatedVolume {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
    pub worker_addr: Option<String>,
    pub path: Option<String>,
}

/// Volume marked for reclamation.
#[derive(Debug, Clone)]
pub struct DestroyingVolume {
    pub id: i64,
    pub handle: String,
    pub worker_name: String,
    pub worker_addr: Option<String>,
}

/// A volume found in either pre- or post-creation state. Callers dispatch
/// on the variant to decide whether to wait for the creator or use the
/// volume directly.
#[derive(Debug, Clone)]
pub enum FoundVolume {
    Creating(CreatingVolume),
    Created(CreatedVolume),
}
