//! Domain layer - Port definitions
//!
//! The reconcile core is written against these traits; adapters implement
//! them for the real cluster and for tests.

pub mod ports;

pub use ports::*;
