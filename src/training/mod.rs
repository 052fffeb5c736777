//! Training infrastructure: the episode-loop trainer, replay buffer, rolling
//! metrics, and greedy evaluation and policy comparison helpers.

pub mod evaluation;
pub mod metrics;
pub mod replay_buffer;
pub mod trainer;

pub use evaluation::{compare_policies, evaluate, PolicyComparison};
pub use metrics::{EpisodeResult, TrainingMetrics};
pub use replay_buffer::ReplayBuffer;
pub use trainer::{
    run_episode, EpsilonDecay, HistoryPoint, Trainer, TrainerConfig, TrainingReport,
};
