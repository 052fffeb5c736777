use std::path::PathBuf;

/// Errors that can occur when validating or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// A collaborator violated the decision-process contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("state {state} is terminal")]
    Terminal { state: String },

    #[error("state {state} has no legal actions")]
    NoLegalActions { state: String },
}

impl StateError {
    pub fn terminal(state: &impl std::fmt::Debug) -> Self {
        StateError::Terminal {
            state: format!("{state:?}"),
        }
    }

    pub fn no_legal_actions(state: &impl std::fmt::Debug) -> Self {
        StateError::NoLegalActions {
            state: format!("{state:?}"),
        }
    }
}

/// Errors raised by the replay buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("cannot sample {requested} records from a buffer holding {available}")]
    InsufficientData { requested: usize, available: usize },
}

/// Errors that can occur while a learner acts or updates.
#[derive(Debug, thiserror::Error)]
pub enum LearnerError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no 'latest' symlink found in {0}")]
    NoLatestSymlink(PathBuf),

    #[error("failed to read {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to save model: {0}")]
    ModelSave(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
