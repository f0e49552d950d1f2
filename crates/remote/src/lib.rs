//! Minimal remote execution backend client.
//!
//! Workers run a backend that actually holds containers and volumes; this
//! crate speaks its Create/Destroy contract and nothing more. Handles are
//! opaque strings, and destroying a handle that is already absent on the
//! remote side is success — the garbage collector depends on that.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::http::{HttpConnector, HttpWorkerBackend};
pub use error::{BackendError, BackendResult};
pub use traits::{BackendConnector, ContainerSpec, VolumeSpec, WorkerBackend};
