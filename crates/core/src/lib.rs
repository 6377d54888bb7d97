//! Domain types and pure helpers shared by the engine, worker and API crates.
//!
//! Nothing in this crate performs I/O.

pub mod audio;
pub mod error;
pub mod job;
pub mod naming;
pub mod types;
