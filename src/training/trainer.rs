use serde::{Deserialize, Serialize};

use crate::ai::Agent;
use crate::error::{ConfigError, LearnerError};
use crate::mdp::{ExperienceSource, Transition};
use crate::training::metrics::{EpisodeResult, TrainingMetrics};

/// Linear epsilon schedule applied by the trainer between episodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonDecay {
    pub start: f64,
    pub end: f64,
    pub decay_episodes: usize,
}

impl EpsilonDecay {
    /// Epsilon for the episode with 0-based index `episode`.
    pub fn value_at(&self, episode: usize) -> f64 {
        if self.decay_episodes == 0 {
            return self.end;
        }
        let progress = (episode as f64 / self.decay_episodes as f64).min(1.0);
        self.start + (self.end - self.start) * progress
    }
}

/// Trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub num_episodes: usize,
    pub max_steps_per_episode: usize,
    pub log_interval: usize,
    /// Record a history point every this many episodes; 0 picks
    /// `num_episodes / 20`.
    pub history_interval: usize,
    pub epsilon_decay: Option<EpsilonDecay>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            num_episodes: 100,
            max_steps_per_episode: 100,
            log_interval: 100,
            history_interval: 0,
            epsilon_decay: None,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps_per_episode == 0 {
            return Err(ConfigError::Validation(
                "max_steps_per_episode must be > 0".into(),
            ));
        }
        if self.log_interval == 0 {
            return Err(ConfigError::Validation("log_interval must be > 0".into()));
        }
        if let Some(decay) = &self.epsilon_decay {
            for (name, value) in [("start", decay.start), ("end", decay.end)] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Validation(format!(
                        "epsilon_decay.{name} must be in [0, 1]"
                    )));
                }
            }
        }
        Ok(())
    }

    fn effective_history_interval(&self) -> usize {
        if self.history_interval == 0 {
            (self.num_episodes / 20).max(1)
        } else {
            self.history_interval
        }
    }
}

/// Sampled point of the training curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub episode: usize,
    pub total_return: f64,
    pub steps: usize,
    pub epsilon: f64,
}

/// Everything recorded during one call to [`Trainer::train`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeResult>,
    pub history: Vec<HistoryPoint>,
    pub total_steps: usize,
    /// Mean fit loss over the last `log_interval` fits; 0 for learners that
    /// never fit a network.
    #[serde(default)]
    pub average_loss: f64,
}

impl TrainingReport {
    /// Mean return over the last N episodes of the run.
    pub fn average_return(&self, last_n: usize) -> f64 {
        let n = self.episodes.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self.episodes.iter().rev().take(n).map(|e| e.total_return).sum();
        sum / n as f64
    }
}

/// Play one episode from the environment's start state.
///
/// The episode ends at a terminal state, at a state without legal actions, or
/// after `max_steps` actions. When `metrics` is given every transition is fed
/// to `agent.update` and the update metrics are recorded; otherwise the agent
/// only acts.
pub fn run_episode<E, G>(
    agent: &mut G,
    env: &mut E,
    max_steps: usize,
    mut metrics: Option<&mut TrainingMetrics>,
) -> Result<EpisodeResult, LearnerError>
where
    E: ExperienceSource,
    G: Agent<E::State, E::Action> + ?Sized,
{
    env.reset();
    agent.start_episode();

    let mut state = env.current_state();
    let mut total_return = 0.0;
    let mut steps = 0;
    let mut reached_terminal = false;

    while steps < max_steps {
        if env.is_terminal(&state) || env.legal_actions(&state).is_empty() {
            reached_terminal = true;
            break;
        }
        let action = agent.get_action(&state)?;
        let (next_state, reward) = env.do_action(&action)?;
        let done = env.is_terminal(&next_state);

        if let Some(metrics) = metrics.as_deref_mut() {
            let update = agent.update(&Transition::new(
                state,
                action,
                next_state.clone(),
                reward,
                done,
            ))?;
            if let Some(td_error) = update.td_error {
                metrics.record_td_error(td_error);
            }
            if let Some(loss) = update.loss {
                metrics.record_loss(loss);
            }
        }

        total_return += reward;
        steps += 1;
        state = next_state;
        if done {
            reached_terminal = true;
            break;
        }
    }

    agent.stop_episode();
    Ok(EpisodeResult {
        total_return,
        steps,
        reached_terminal,
    })
}

/// Episode-loop driver for the online learners.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Trainer { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the full training loop.
    pub fn train<E, G>(&self, agent: &mut G, env: &mut E) -> Result<TrainingReport, LearnerError>
    where
        E: ExperienceSource,
        G: Agent<E::State, E::Action> + ?Sized,
    {
        let mut metrics = TrainingMetrics::with_capacity(self.config.log_interval);
        let mut report = TrainingReport::default();
        let history_interval = self.config.effective_history_interval();

        tracing::info!(
            agent = agent.name(),
            episodes = self.config.num_episodes,
            max_steps = self.config.max_steps_per_episode,
            "starting training"
        );

        for episode in 0..self.config.num_episodes {
            if let Some(decay) = &self.config.epsilon_decay {
                agent.set_epsilon(decay.value_at(episode));
            }

            let result = run_episode(
                agent,
                env,
                self.config.max_steps_per_episode,
                Some(&mut metrics),
            )?;
            metrics.record_episode(result);
            report.episodes.push(result);
            report.total_steps += result.steps;

            if episode % history_interval == 0 {
                report.history.push(HistoryPoint {
                    episode,
                    total_return: result.total_return,
                    steps: result.steps,
                    epsilon: agent.epsilon(),
                });
            }

            if (episode + 1) % self.config.log_interval == 0 {
                let window = self.config.log_interval;
                tracing::info!(
                    episode = episode + 1,
                    epsilon = agent.epsilon(),
                    avg_return = metrics.average_return(window),
                    avg_steps = metrics.average_steps(window),
                    terminal_rate = metrics.terminal_rate(window),
                    td_error = metrics.average_td_error(window),
                    loss = metrics.average_loss(window),
                    "training progress"
                );
            }
        }

        report.average_loss = metrics.average_loss(self.config.log_interval);
        tracing::info!(
            episodes = metrics.total_episodes(),
            total_steps = report.total_steps,
            "training complete"
        );
        Ok(report)
    }
}
