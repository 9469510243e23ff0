//! Maintenance tooling for Sylime learning stores.

pub mod commands;
pub mod snapshot;
#[cfg(feature = "trace")]
pub mod trace_init;
