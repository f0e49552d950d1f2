//! Backend implementations.

pub mod http;
