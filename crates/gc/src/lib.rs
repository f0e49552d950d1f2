//! Garbage collection for drydock containers and volumes.
//!
//! The collector periodically identifies resources eligible for
//! reclamation and drives their two-phase destruction to completion:
//! mark as destroying in storage, confirm remote deletion, then remove
//! the storage row. Partial progress is fine — anything left marked is
//! picked up again on the next cycle.

pub mod collector;
pub mod runner;

pub use collector::{Collector, CycleStats};
pub use runner::Runner;
