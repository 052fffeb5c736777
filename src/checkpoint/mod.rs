//! Checkpoint persistence: one directory per save with learner state,
//! metadata and optional network weights, plus a `latest` symlink.

mod manager;
mod metadata;

pub use manager::{CheckpointData, CheckpointManager, CheckpointManagerConfig, CheckpointRequest};
pub use metadata::{CheckpointMetadata, CheckpointMetrics};
