//! Command implementations, one module per command group.

pub mod config;
pub mod counters;
pub mod pending;
pub mod submit;
pub mod sync;
