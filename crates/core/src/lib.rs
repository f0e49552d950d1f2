//! Shared domain types and configuration for drydock.
//!
//! This crate provides the vocabulary the rest of the workspace speaks:
//! - Container and volume lifecycle states
//! - Container step metadata
//! - Worker liveness states
//! - Configuration for the metadata store and the garbage collector

pub mod config;
pub mod resource;

pub use config::{AppConfig, GcConfig, MetadataConfig, PgSslMode};
pub use resource::{ContainerMetadata, ContainerState, VolumeState, WorkerState};
