use serde::{Deserialize, Serialize};

/// Training metrics snapshot at checkpoint time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    pub average_return: f64,
    pub average_steps: f64,
    pub terminal_rate: f64,
    #[serde(default)]
    pub current_loss: f64,
    pub training_steps: usize,
}

/// Top-level checkpoint metadata written to metadata.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub episode: usize,
    pub timestamp: u64,
    pub algorithm: String,
    pub metrics: CheckpointMetrics,
    /// Learner settings as recorded by the saving learner.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub hyperparameters: serde_json::Value,
}
