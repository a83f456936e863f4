//! Shared data model for `Taskboard`: projects, task boards, sync status,
//! remote row shapes, and the JSON codec for locally persisted blobs.

pub mod board;
pub mod codec;
pub mod project;
pub mod remote;
pub mod status;
pub mod task;
