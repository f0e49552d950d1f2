//! Repository traits for resource lifecycle operations.

pub mod containers;
pub mod volumes;
pub mod workers;

pub use containers::ContainerRepo;
pub use volumes::VolumeRepo;
pub use workers::WorkerRepo;
