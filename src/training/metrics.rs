use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Outcome of a single training or evaluation episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeResult {
    pub total_return: f64,
    pub steps: usize,
    /// False when the step cap ended the episode.
    pub reached_terminal: bool,
}

/// Rolling-window tracker for returns, episode lengths and update errors.
pub struct TrainingMetrics {
    episode_results: VecDeque<EpisodeResult>,
    td_errors: VecDeque<f64>,
    losses: VecDeque<f32>,
    capacity: usize,
    total_episodes: usize, // lifetime count, never capped
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TrainingMetrics {
            episode_results: VecDeque::with_capacity(capacity),
            td_errors: VecDeque::with_capacity(capacity),
            losses: VecDeque::with_capacity(capacity),
            capacity,
            total_episodes: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn record_episode(&mut self, result: EpisodeResult) {
        self.total_episodes += 1;
        push_capped(&mut self.episode_results, result, self.capacity);
    }

    pub fn record_td_error(&mut self, td_error: f64) {
        push_capped(&mut self.td_errors, td_error.abs(), self.capacity);
    }

    pub fn record_loss(&mut self, loss: f32) {
        push_capped(&mut self.losses, loss, self.capacity);
    }

    /// Mean return over the last N episodes.
    pub fn average_return(&self, last_n: usize) -> f64 {
        mean(self.episode_results.iter().rev().take(last_n).map(|r| r.total_return))
    }

    /// Mean episode length over the last N episodes.
    pub fn average_steps(&self, last_n: usize) -> f64 {
        mean(self.episode_results.iter().rev().take(last_n).map(|r| r.steps as f64))
    }

    /// Fraction of the last N episodes that reached a terminal state.
    pub fn terminal_rate(&self, last_n: usize) -> f64 {
        mean(
            self.episode_results
                .iter()
                .rev()
                .take(last_n)
                .map(|r| if r.reached_terminal { 1.0 } else { 0.0 }),
        )
    }

    /// Mean absolute TD error over the last N updates.
    pub fn average_td_error(&self, last_n: usize) -> f64 {
        mean(self.td_errors.iter().rev().take(last_n).copied())
    }

    /// Mean loss over the last N network fits.
    pub fn average_loss(&self, last_n: usize) -> f64 {
        mean(self.losses.iter().rev().take(last_n).map(|&l| f64::from(l)))
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn push_capped<T>(queue: &mut VecDeque<T>, value: T, capacity: usize) {
    queue.push_back(value);
    if queue.len() > capacity {
        queue.pop_front();
    }
}

/// 0.0 for an empty sequence.
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
