use std::path::Path;

use crate::ai::algorithms::DqnConfig;
use crate::ai::{LearnerParams, MlpSettings};
use crate::checkpoint::CheckpointManagerConfig;
use crate::error::ConfigError;
use crate::mdp::{Gridworld, GRID_NAMES};
use crate::training::trainer::TrainerConfig;

/// Which grid world to build and how it behaves.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridworldConfig {
    pub name: String,
    pub noise: f64,
    pub living_reward: f64,
    pub discount: f64,
}

impl Default for GridworldConfig {
    fn default() -> Self {
        GridworldConfig {
            name: "book".to_string(),
            noise: 0.2,
            living_reward: 0.0,
            discount: 0.9,
        }
    }
}

impl GridworldConfig {
    /// Build the named layout with this section's settings applied.
    pub fn build(&self) -> Result<Gridworld, ConfigError> {
        Ok(Gridworld::named(&self.name)?
            .with_noise(self.noise)
            .with_living_reward(self.living_reward)
            .with_discount(self.discount))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig { iterations: 100 }
    }
}

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gridworld: GridworldConfig,
    pub solver: SolverConfig,
    pub q_learning: LearnerParams,
    pub approximate: LearnerParams,
    pub dqn: DqnConfig,
    pub network: MlpSettings,
    pub training: TrainerConfig,
    pub checkpoint: CheckpointManagerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            gridworld: GridworldConfig::default(),
            solver: SolverConfig::default(),
            q_learning: LearnerParams::new(0.3, 0.5, 0.9),
            approximate: LearnerParams::new(0.3, 0.2, 0.9),
            dqn: DqnConfig::default(),
            network: MlpSettings::default(),
            training: TrainerConfig::default(),
            checkpoint: CheckpointManagerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !GRID_NAMES.contains(&self.gridworld.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "gridworld.name must be one of {GRID_NAMES:?}, got '{}'",
                self.gridworld.name
            )));
        }
        if !(0.0..=1.0).contains(&self.gridworld.noise) {
            return Err(ConfigError::Validation(
                "gridworld.noise must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gridworld.discount) {
            return Err(ConfigError::Validation(
                "gridworld.discount must be in [0, 1]".into(),
            ));
        }
        if self.solver.iterations == 0 {
            return Err(ConfigError::Validation(
                "solver.iterations must be > 0".into(),
            ));
        }

        let learners = [
            ("q_learning", &self.q_learning),
            ("approximate", &self.approximate),
        ];
        for (section, params) in learners {
            params
                .validate()
                .map_err(|e| ConfigError::Validation(format!("{section}: {e}")))?;
        }
        self.dqn
            .validate()
            .map_err(|e| ConfigError::Validation(format!("dqn: {e}")))?;

        if self.network.hidden_dim == 0 {
            return Err(ConfigError::Validation(
                "network.hidden_dim must be > 0".into(),
            ));
        }
        if self.network.learning_rate <= 0.0 {
            return Err(ConfigError::Validation(
                "network.learning_rate must be > 0".into(),
            ));
        }

        if self.training.num_episodes == 0 {
            return Err(ConfigError::Validation(
                "training.num_episodes must be > 0".into(),
            ));
        }
        self.training
            .validate()
            .map_err(|e| ConfigError::Validation(format!("training: {e}")))?;

        if self.checkpoint.keep_last_n == 0 {
            return Err(ConfigError::Validation(
                "checkpoint.keep_last_n must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate a TOML string with all default values.
    pub fn default_toml() -> Result<String, ConfigError> {
        toml::to_string_pretty(&AppConfig::default())
            .map_err(|e| ConfigError::Validation(format!("serializing defaults: {e}")))
    }
}
