//! `Taskboard`: local-first task board with remote reconciliation.

pub mod colors;
pub mod config;
pub mod remote;
pub mod store;
pub mod sync;
