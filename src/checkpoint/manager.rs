use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::checkpoint::metadata::{CheckpointMetadata, CheckpointMetrics};
use crate::error::CheckpointError;

const STATE_FILE: &str = "state.json";
const METADATA_FILE: &str = "metadata.json";

/// Configuration for the checkpoint manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointManagerConfig {
    pub checkpoint_dir: PathBuf,
    pub keep_last_n: usize,
    pub keep_best_n: usize,
}

impl Default for CheckpointManagerConfig {
    fn default() -> Self {
        CheckpointManagerConfig {
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last_n: 5,
            keep_best_n: 3,
        }
    }
}

/// What the saving learner contributes to a checkpoint.
pub struct CheckpointRequest<'a, T: Serialize> {
    pub algorithm: &'a str,
    pub episode: usize,
    pub metrics: CheckpointMetrics,
    pub hyperparameters: serde_json::Value,
    /// Learner state written to state.json.
    pub state: &'a T,
}

/// A loaded checkpoint. The learner deserializes its own state.
#[derive(Debug)]
pub struct CheckpointData {
    pub path: PathBuf,
    pub metadata: CheckpointMetadata,
    pub state_json: String,
}

impl CheckpointData {
    pub fn state<T: DeserializeOwned>(&self) -> Result<T, CheckpointError> {
        serde_json::from_str(&self.state_json).map_err(|e| CheckpointError::MetadataParse {
            path: self.path.join(STATE_FILE),
            source: e,
        })
    }
}

/// Manages saving, loading, listing, and pruning checkpoints.
pub struct CheckpointManager {
    config: CheckpointManagerConfig,
}

impl CheckpointManager {
    pub fn new(config: CheckpointManagerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.checkpoint_dir)?;
        Ok(CheckpointManager { config })
    }

    pub fn config(&self) -> &CheckpointManagerConfig {
        &self.config
    }

    /// Save a checkpoint holding only serialized learner state.
    pub fn save<T: Serialize>(
        &self,
        request: CheckpointRequest<'_, T>,
    ) -> Result<PathBuf, CheckpointError> {
        self.save_with(request, |_| Ok(()))
    }

    /// Save a checkpoint; `write_extra` adds files (network weights) to the
    /// directory before it is published.
    pub fn save_with<T, F>(
        &self,
        request: CheckpointRequest<'_, T>,
        write_extra: F,
    ) -> Result<PathBuf, CheckpointError>
    where
        T: Serialize,
        F: FnOnce(&Path) -> Result<(), CheckpointError>,
    {
        let dir_name = format!("checkpoint_{:07}", request.episode);
        let tmp_dir = self.config.checkpoint_dir.join(format!("{dir_name}.tmp"));
        let final_dir = self.config.checkpoint_dir.join(&dir_name);

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        if let Err(e) = write_staged(&tmp_dir, request, write_extra) {
            let _ = fs::remove_dir_all(&tmp_dir);
            return Err(e);
        }

        // Publish by rename
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        self.update_latest_symlink(&dir_name)?;
        self.prune_old_checkpoints()?;

        tracing::debug!(path = %final_dir.display(), "checkpoint saved");
        Ok(final_dir)
    }

    /// Load the checkpoint stored in `dir`.
    pub fn load_checkpoint(&self, dir: &Path) -> Result<CheckpointData, CheckpointError> {
        let metadata = read_metadata(&dir.join(METADATA_FILE))?;
        let state_path = dir.join(STATE_FILE);
        let state_json =
            fs::read_to_string(&state_path).map_err(|e| CheckpointError::MetadataRead {
                path: state_path,
                source: e,
            })?;

        Ok(CheckpointData {
            path: dir.to_path_buf(),
            metadata,
            state_json,
        })
    }

    /// Load the checkpoint the `latest` symlink points at.
    pub fn load_latest(&self) -> Result<CheckpointData, CheckpointError> {
        let latest_link = self.config.checkpoint_dir.join("latest");
        if !latest_link.exists() {
            return Err(CheckpointError::NoLatestSymlink(
                self.config.checkpoint_dir.clone(),
            ));
        }
        let resolved = fs::read_link(&latest_link)?;
        let target = if resolved.is_relative() {
            self.config.checkpoint_dir.join(resolved)
        } else {
            resolved
        };
        self.load_checkpoint(&target)
    }

    /// List all checkpoints sorted by episode (ascending).
    pub fn list_checkpoints(&self) -> Result<Vec<(PathBuf, CheckpointMetadata)>, CheckpointError> {
        let mut results = Vec::new();
        for entry in fs::read_dir(&self.config.checkpoint_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || path.is_symlink() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("checkpoint_") || name.ends_with(".tmp") {
                continue;
            }
            let meta_path = path.join(METADATA_FILE);
            if meta_path.exists() {
                let metadata = read_metadata(&meta_path)?;
                results.push((path, metadata));
            }
        }
        results.sort_by_key(|(_, m)| m.episode);
        Ok(results)
    }

    /// Keep the union of the last N by episode and the best N by average return.
    fn prune_old_checkpoints(&self) -> Result<(), CheckpointError> {
        let checkpoints = self.list_checkpoints()?;
        if checkpoints.len() <= self.config.keep_last_n {
            return Ok(());
        }

        let total = checkpoints.len();
        let mut keep: HashSet<usize> =
            (total.saturating_sub(self.config.keep_last_n)..total).collect();

        let mut by_return: Vec<(usize, f64)> = checkpoints
            .iter()
            .enumerate()
            .map(|(i, (_, m))| (i, m.metrics.average_return))
            .collect();
        by_return.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        keep.extend(
            by_return
                .iter()
                .take(self.config.keep_best_n)
                .map(|(i, _)| *i),
        );

        for (i, (path, _)) in checkpoints.iter().enumerate() {
            if !keep.contains(&i) {
                fs::remove_dir_all(path)?;
                tracing::debug!(path = %path.display(), "pruned checkpoint");
            }
        }
        Ok(())
    }

    /// Point the `latest` symlink at the given checkpoint directory name.
    fn update_latest_symlink(&self, dir_name: &str) -> Result<(), CheckpointError> {
        let link_path = self.config.checkpoint_dir.join("latest");
        if link_path.symlink_metadata().is_ok() {
            fs::remove_file(&link_path)?;
        }
        std::os::unix::fs::symlink(dir_name, &link_path)?;
        Ok(())
    }
}

/// Write the extra files, state and metadata into the staging directory.
fn write_staged<T, F>(
    tmp_dir: &Path,
    request: CheckpointRequest<'_, T>,
    write_extra: F,
) -> Result<(), CheckpointError>
where
    T: Serialize,
    F: FnOnce(&Path) -> Result<(), CheckpointError>,
{
    write_extra(tmp_dir)?;
    fs::write(
        tmp_dir.join(STATE_FILE),
        serde_json::to_string_pretty(request.state)?,
    )?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let metadata = CheckpointMetadata {
        episode: request.episode,
        timestamp,
        algorithm: request.algorithm.to_string(),
        metrics: request.metrics,
        hyperparameters: request.hyperparameters,
    };
    fs::write(
        tmp_dir.join(METADATA_FILE),
        serde_json::to_string_pretty(&metadata)?,
    )?;
    Ok(())
}

fn read_metadata(path: &Path) -> Result<CheckpointMetadata, CheckpointError> {
    let json = fs::read_to_string(path).map_err(|e| CheckpointError::MetadataRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| CheckpointError::MetadataParse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Agent, LearnerParams, QLearningAgent};
    use crate::ai::algorithms::QLearningState;
    use crate::mdp::Transition;

    fn manager(dir: &Path, keep_last_n: usize, keep_best_n: usize) -> CheckpointManager {
        CheckpointManager::new(CheckpointManagerConfig {
            checkpoint_dir: dir.to_path_buf(),
            keep_last_n,
            keep_best_n,
        })
        .unwrap()
    }

    fn metrics(average_return: f64) -> CheckpointMetrics {
        CheckpointMetrics {
            average_return,
            average_steps: 8.0,
            terminal_rate: 1.0,
            current_loss: 0.0,
            training_steps: 100,
        }
    }

    fn save_plain(manager: &CheckpointManager, episode: usize, average_return: f64) -> PathBuf {
        manager
            .save(CheckpointRequest {
                algorithm: "test",
                episode,
                metrics: metrics(average_return),
                hyperparameters: serde_json::Value::Null,
                state: &episode,
            })
            .unwrap()
    }

    fn agent() -> QLearningAgent<u8, u8> {
        QLearningAgent::new(LearnerParams::new(0.1, 1.0, 0.9), |_: &u8| vec![0, 1]).unwrap()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5, 3);
        let mut learner = agent();
        learner
            .update(&Transition::new(0, 1, 1, 4.0, true))
            .unwrap();

        let path = manager
            .save(CheckpointRequest {
                algorithm: learner.name(),
                episode: 1000,
                metrics: metrics(0.5),
                hyperparameters: serde_json::to_value(learner.params()).unwrap(),
                state: &learner.snapshot(),
            })
            .unwrap();
        assert!(path.join("metadata.json").exists());
        assert!(path.join("state.json").exists());
        assert!(!dir.path().join("checkpoint_0001000.tmp").exists());

        let data = manager.load_checkpoint(&path).unwrap();
        assert_eq!(data.metadata.episode, 1000);
        assert_eq!(data.metadata.algorithm, "Q-Learning");

        let mut restored = agent();
        restored.restore(data.state::<QLearningState<u8, u8>>().unwrap());
        assert_eq!(restored.get_q_value(&0, &1), 4.0);
    }

    #[test]
    fn test_save_with_extra_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5, 3);
        let path = manager
            .save_with(
                CheckpointRequest {
                    algorithm: "DQN",
                    episode: 7,
                    metrics: metrics(0.0),
                    hyperparameters: serde_json::Value::Null,
                    state: &"counters",
                },
                |tmp| {
                    fs::write(tmp.join("online.bin"), b"weights")?;
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(fs::read(path.join("online.bin")).unwrap(), b"weights");
    }

    #[test]
    fn test_failed_extra_writer_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5, 3);
        let result = manager.save_with(
            CheckpointRequest {
                algorithm: "DQN",
                episode: 3,
                metrics: metrics(0.0),
                hyperparameters: serde_json::Value::Null,
                state: &0u8,
            },
            |_| Err(CheckpointError::ModelSave("disk full".into())),
        );
        assert!(matches!(result, Err(CheckpointError::ModelSave(_))));
        assert!(!dir.path().join("checkpoint_0000003.tmp").exists());
        assert!(manager.list_checkpoints().unwrap().is_empty());
        assert!(manager.load_latest().is_err());
    }

    #[test]
    fn test_latest_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5, 3);
        save_plain(&manager, 1000, 0.1);
        save_plain(&manager, 2000, 0.1);

        let latest = manager.load_latest().unwrap();
        assert_eq!(latest.metadata.episode, 2000);
        assert_eq!(latest.state::<usize>().unwrap(), 2000);
    }

    #[test]
    fn test_list_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 10, 10);
        for ep in [3000, 1000, 2000] {
            save_plain(&manager, ep, 0.0);
        }

        let list = manager.list_checkpoints().unwrap();
        let episodes: Vec<usize> = list.iter().map(|(_, m)| m.episode).collect();
        assert_eq!(episodes, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 2, 1);

        let returns = [0.5, 0.9, 0.3, 0.6, 0.7];
        for (i, &r) in returns.iter().enumerate() {
            save_plain(&manager, (i + 1) * 1000, r);
        }

        // Last 2 (4000, 5000) plus best 1 (2000)
        let list = manager.list_checkpoints().unwrap();
        let episodes: Vec<usize> = list.iter().map(|(_, m)| m.episode).collect();
        assert_eq!(episodes, vec![2000, 4000, 5000]);
    }

    #[test]
    fn test_load_latest_no_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5, 3);

        let err = manager.load_latest().unwrap_err();
        assert!(
            matches!(err, CheckpointError::NoLatestSymlink(_)),
            "expected NoLatestSymlink, got: {err}"
        );
    }

    #[test]
    fn test_wrong_state_type_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5, 3);
        let path = save_plain(&manager, 1, 0.0);
        let data = manager.load_checkpoint(&path).unwrap();
        assert!(matches!(
            data.state::<Vec<String>>(),
            Err(CheckpointError::MetadataParse { .. })
        ));
    }
}
