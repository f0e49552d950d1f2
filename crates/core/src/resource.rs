//! Lifecycle states and step metadata for containers, volumes, and workers.

use serde::{Deserialize, Serialize};

/// Container lifecycle state.
///
/// Transitions are strictly monotonic: Creating -> Created -> Destroying,
/// then the row is removed. A destroying container is never revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Row persisted, remote creation not yet confirmed.
    Creating,
    /// Remote creation confirmed by the creator.
    Created,
    /// Marked for reclamation; awaiting confirmed remote deletion.
    Destroying,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Destroying => "destroying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creating" => Some(Self::Creating),
            "created" => Some(Self::Created),
            "destroying" => Some(Self::Destroying),
            _ => None,
        }
    }
}

/// Volume lifecycle state. Same three-phase protocol as containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    Creating,
    Created,
    Destroying,
}

impl VolumeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Destroying => "destroying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creating" => Some(Self::Creating),
            "created" => Some(Self::Created),
            "destroying" => Some(Self::Destroying),
            _ => None,
        }
    }
}

/// Worker liveness state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Accepting work and reachable for remote deletes.
    Running,
    /// Drained/retired; existing resources remain until reaped.
    Landed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Landed => "landed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "landed" => Some(Self::Landed),
            _ => None,
        }
    }
}

/// Why a task container exists within its build plan.
///
/// Immutable once the container row is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Step type, e.g. "task", "put".
    pub step_type: String,
    /// Step name as written in the pipeline.
    pub step_name: String,
}
