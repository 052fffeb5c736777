use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ai::agent::{validate_discount, Agent, UpdateMetrics};
use crate::ai::approximator::{FitSample, FunctionApproximator};
use crate::ai::exploration::{argmax_first, build_rng, epsilon_greedy, max_value};
use crate::ai::state_encoding::StateEncoder;
use crate::error::{ConfigError, LearnerError, StateError};
use crate::mdp::{ActionFn, ActionKey, StateKey, Transition};
use crate::training::replay_buffer::ReplayBuffer;

/// What the target-network update interval counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSync {
    /// Learner updates (one per observed transition).
    Steps,
    /// Completed episodes, counted by `stop_episode`.
    Episodes,
}

/// DQN hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub discount: f64,
    pub epsilon: f64,
    pub batch_size: usize,
    pub replay_capacity: usize,
    /// Fitting starts once the buffer holds `max(batch_size, min_replay_size)`.
    pub min_replay_size: usize,
    /// Fit once every this many updates.
    pub train_interval: usize,
    pub target_update_interval: usize,
    pub target_sync: TargetSync,
    pub double_q: bool,
    pub seed: Option<u64>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        DqnConfig {
            discount: 0.9,
            epsilon: 0.1,
            batch_size: 32,
            replay_capacity: 10_000,
            min_replay_size: 100,
            train_interval: 1,
            target_update_interval: 200,
            target_sync: TargetSync::Steps,
            double_q: true,
            seed: None,
        }
    }
}

impl DqnConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discount(self.discount)?;
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ConfigError::Validation("epsilon must be in [0, 1]".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size must be > 0".into()));
        }
        if self.batch_size > self.replay_capacity {
            return Err(ConfigError::Validation(format!(
                "batch_size ({}) exceeds replay_capacity ({})",
                self.batch_size, self.replay_capacity
            )));
        }
        if self.train_interval == 0 {
            return Err(ConfigError::Validation("train_interval must be > 0".into()));
        }
        if self.target_update_interval == 0 {
            return Err(ConfigError::Validation(
                "target_update_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Counters and settings persisted alongside network weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqnTrainingState {
    pub config: DqnConfig,
    pub epsilon: f64,
    pub step_count: usize,
    pub episode_count: usize,
    pub train_steps: usize,
}

/// Deep Q-learning agent: an online approximator fitted on replayed batches
/// and a lagged target copy used to compute the regression targets.
pub struct DqnAgent<S, A, N: FunctionApproximator> {
    online: N,
    target: N,
    replay_buffer: ReplayBuffer<Transition<S, A>>,
    actions: Vec<A>,
    encoder: Box<dyn StateEncoder<S>>,
    action_fn: ActionFn<S, A>,
    config: DqnConfig,
    epsilon: f64,
    step_count: usize,
    episode_count: usize,
    train_steps: usize,
    rng: StdRng,
}

impl<S, A, N> DqnAgent<S, A, N>
where
    S: StateKey,
    A: ActionKey,
    N: FunctionApproximator,
{
    /// `actions` is the output alphabet: network output `i` scores `actions[i]`.
    /// The target starts as a copy of the online parameters.
    pub fn new(
        config: DqnConfig,
        online: N,
        mut target: N,
        encoder: impl StateEncoder<S> + 'static,
        actions: Vec<A>,
        action_fn: impl Fn(&S) -> Vec<A> + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if online.num_actions() != actions.len() || target.num_actions() != actions.len() {
            return Err(ConfigError::Validation(format!(
                "approximators have {} and {} outputs for {} actions",
                online.num_actions(),
                target.num_actions(),
                actions.len()
            )));
        }
        for (i, action) in actions.iter().enumerate() {
            if actions[..i].contains(action) {
                return Err(ConfigError::Validation(format!(
                    "duplicate action {action:?}"
                )));
            }
        }

        target.load_parameters(online.clone_parameters());
        let replay_buffer = replay_buffer_for(&config)?;

        Ok(DqnAgent {
            online,
            target,
            replay_buffer,
            actions,
            encoder: Box::new(encoder),
            action_fn: Box::new(action_fn),
            epsilon: config.epsilon,
            rng: build_rng(config.seed.map(|s| s.wrapping_add(1))),
            config,
            step_count: 0,
            episode_count: 0,
            train_steps: 0,
        })
    }

    pub fn online(&self) -> &N {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut N {
        &mut self.online
    }

    pub fn target(&self) -> &N {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut N {
        &mut self.target
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer<Transition<S, A>> {
        &self.replay_buffer
    }

    /// Drop every stored transition.
    pub fn clear_replay(&mut self) {
        self.replay_buffer.clear();
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    /// Number of fits performed so far.
    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn legal_actions(&self, state: &S) -> Vec<A> {
        (self.action_fn)(state)
    }

    fn action_index(&self, action: &A) -> Result<usize, ConfigError> {
        self.actions
            .iter()
            .position(|a| a == action)
            .ok_or_else(|| {
                ConfigError::Validation(format!("action {action:?} is not in the action alphabet"))
            })
    }

    /// Copy the online parameters into the target approximator.
    pub fn sync_target(&mut self) {
        self.target.load_parameters(self.online.clone_parameters());
        tracing::debug!(
            steps = self.step_count,
            episodes = self.episode_count,
            "target network synced"
        );
    }

    /// Regression target for each record of `batch`.
    ///
    /// `y = r` when the record is terminal or its successor has no legal
    /// actions, otherwise `y = r + γ·Q_target(s', a*)`. `a*` maximizes the
    /// target network's Q-values, or the online network's when `double_q`.
    pub fn td_targets(
        &self,
        batch: &[Transition<S, A>],
        double_q: bool,
    ) -> Result<Vec<f32>, LearnerError> {
        let gamma = self.config.discount as f32;
        let mut targets = Vec::with_capacity(batch.len());
        for record in batch {
            let reward = record.reward as f32;
            let legal = if record.done {
                Vec::new()
            } else {
                self.legal_actions(&record.next_state)
            };
            if legal.is_empty() {
                targets.push(reward);
                continue;
            }

            let indices = legal
                .iter()
                .map(|a| self.action_index(a))
                .collect::<Result<Vec<_>, _>>()?;
            let features = self.encoder.encode(&record.next_state);
            let target_q = self.target.predict(&features);
            let best = if double_q {
                let online_q = self.online.predict(&features);
                argmax_first(&indices, |&i| f64::from(online_q[i]))
            } else {
                argmax_first(&indices, |&i| f64::from(target_q[i]))
            };
            let next_value = best.map_or(0.0, |i| target_q[i]);
            targets.push(reward + gamma * next_value);
        }
        Ok(targets)
    }

    /// Sample a batch and fit the online approximator once.
    fn train_step(&mut self) -> Result<f32, LearnerError> {
        let batch = self.replay_buffer.sample(self.config.batch_size)?;
        let targets = self.td_targets(&batch, self.config.double_q)?;

        let mut samples = Vec::with_capacity(batch.len());
        for (record, target) in batch.iter().zip(targets) {
            samples.push(FitSample {
                features: self.encoder.encode(&record.state),
                action: self.action_index(&record.action)?,
                target,
            });
        }

        let loss = self.online.fit(&samples);
        self.train_steps += 1;
        tracing::debug!(train_steps = self.train_steps, loss, "fitted online network");
        Ok(loss)
    }

    fn q_values(&self, state: &S) -> Vec<f32> {
        self.online.predict(&self.encoder.encode(state))
    }

    pub fn training_state(&self) -> DqnTrainingState {
        DqnTrainingState {
            config: self.config.clone(),
            epsilon: self.epsilon,
            step_count: self.step_count,
            episode_count: self.episode_count,
            train_steps: self.train_steps,
        }
    }

    /// Restore counters and settings; network weights are restored separately.
    ///
    /// The restored config must pass validation, otherwise nothing changes. A
    /// different `replay_capacity` rebuilds the buffer, keeping the newest
    /// records that fit.
    pub fn restore_training_state(&mut self, state: DqnTrainingState) -> Result<(), ConfigError> {
        state.config.validate()?;
        if !(0.0..=1.0).contains(&state.epsilon) {
            return Err(ConfigError::Validation(format!(
                "restored epsilon {} is outside [0, 1]",
                state.epsilon
            )));
        }

        if state.config.replay_capacity != self.replay_buffer.capacity() {
            let mut buffer = replay_buffer_for(&state.config)?;
            for record in self.replay_buffer.iter() {
                buffer.push(record.clone());
            }
            self.replay_buffer = buffer;
        }
        self.config = state.config;
        self.epsilon = state.epsilon;
        self.step_count = state.step_count;
        self.episode_count = state.episode_count;
        self.train_steps = state.train_steps;
        Ok(())
    }
}

fn replay_buffer_for<T: Clone>(config: &DqnConfig) -> Result<ReplayBuffer<T>, ConfigError> {
    match config.seed {
        Some(seed) => ReplayBuffer::with_seed(config.replay_capacity, seed),
        None => ReplayBuffer::new(config.replay_capacity),
    }
}

impl<S, A, N> Agent<S, A> for DqnAgent<S, A, N>
where
    S: StateKey,
    A: ActionKey,
    N: FunctionApproximator,
{
    fn name(&self) -> &str {
        "DQN"
    }

    fn get_action(&mut self, state: &S) -> Result<A, StateError> {
        let legal = self.legal_actions(state);
        if legal.is_empty() {
            return Err(StateError::no_legal_actions(state));
        }
        let q = self.q_values(state);
        let scores: Vec<f64> = legal
            .iter()
            .map(|a| {
                self.actions
                    .iter()
                    .position(|x| x == a)
                    .and_then(|i| q.get(i))
                    .map_or(f64::NEG_INFINITY, |&v| f64::from(v))
            })
            .collect();
        let indices: Vec<usize> = (0..legal.len()).collect();
        epsilon_greedy(&mut self.rng, self.epsilon, &indices, |&i| scores[i])
            .map(|i| legal[i].clone())
            .ok_or_else(|| StateError::no_legal_actions(state))
    }

    fn update(&mut self, transition: &Transition<S, A>) -> Result<UpdateMetrics, LearnerError> {
        self.action_index(&transition.action)?;
        self.replay_buffer.push(transition.clone());
        self.step_count += 1;

        let threshold = self.config.min_replay_size.max(self.config.batch_size);
        let mut metrics = UpdateMetrics::default();
        if self.replay_buffer.len() >= threshold
            && self.step_count % self.config.train_interval == 0
        {
            metrics.loss = Some(self.train_step()?);
        }

        if self.config.target_sync == TargetSync::Steps
            && self.step_count % self.config.target_update_interval == 0
        {
            self.sync_target();
        }
        Ok(metrics)
    }

    fn get_q_value(&self, state: &S, action: &A) -> f64 {
        match self.actions.iter().position(|a| a == action) {
            Some(i) => self.q_values(state).get(i).map_or(0.0, |&v| f64::from(v)),
            None => 0.0,
        }
    }

    fn get_value(&self, state: &S) -> f64 {
        let legal = self.legal_actions(state);
        if legal.is_empty() {
            return 0.0;
        }
        max_value(legal.iter().map(|a| self.get_q_value(state, a)))
    }

    fn get_policy(&self, state: &S) -> Option<A> {
        let q = self.q_values(state);
        argmax_first(&self.legal_actions(state), |a| {
            self.actions
                .iter()
                .position(|x| x == a)
                .and_then(|i| q.get(i))
                .map_or(f64::NEG_INFINITY, |&v| f64::from(v))
        })
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    fn stop_episode(&mut self) {
        self.episode_count += 1;
        if self.config.target_sync == TargetSync::Episodes
            && self.episode_count % self.config.target_update_interval == 0
        {
            self.sync_target();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::state_encoding::OneHotEncoder;
    use crate::mdp::{MdpEnvironment, TabularMdp};
    use crate::training::{Trainer, TrainerConfig};

    /// Linear per-action table over the encoded features, fitted by plain
    /// gradient steps.
    struct TableApproximator {
        weights: Vec<Vec<f32>>,
        learning_rate: f32,
        fits: usize,
    }

    impl TableApproximator {
        fn new(input_dim: usize, num_actions: usize) -> Self {
            TableApproximator {
                weights: vec![vec![0.0; input_dim]; num_actions],
                learning_rate: 0.5,
                fits: 0,
            }
        }

        fn constant(values: &[f32]) -> Self {
            TableApproximator {
                weights: values.iter().map(|&v| vec![v]).collect(),
                learning_rate: 0.0,
                fits: 0,
            }
        }
    }

    impl FunctionApproximator for TableApproximator {
        type Snapshot = Vec<Vec<f32>>;

        fn num_actions(&self) -> usize {
            self.weights.len()
        }

        fn predict(&self, features: &[f32]) -> Vec<f32> {
            self.weights
                .iter()
                .map(|w| w.iter().zip(features).map(|(w, x)| w * x).sum())
                .collect()
        }

        fn fit(&mut self, batch: &[FitSample]) -> f32 {
            self.fits += 1;
            let mut loss = 0.0;
            for sample in batch {
                let q = self.predict(&sample.features)[sample.action];
                let err = sample.target - q;
                loss += err * err;
                for (w, x) in self.weights[sample.action].iter_mut().zip(&sample.features) {
                    *w += self.learning_rate * err * x;
                }
            }
            loss / batch.len() as f32
        }

        fn clone_parameters(&self) -> Self::Snapshot {
            self.weights.clone()
        }

        fn load_parameters(&mut self, snapshot: Self::Snapshot) {
            self.weights = snapshot;
        }
    }

    /// Encodes every state as the single feature 1.0.
    struct ConstantEncoder;

    impl StateEncoder<&'static str> for ConstantEncoder {
        fn dim(&self) -> usize {
            1
        }

        fn encode(&self, _state: &&'static str) -> Vec<f32> {
            vec![1.0]
        }
    }

    fn chain_actions(state: &&'static str) -> Vec<usize> {
        match *state {
            "T" => vec![],
            _ => vec![0, 1],
        }
    }

    fn small_config() -> DqnConfig {
        DqnConfig {
            discount: 0.5,
            epsilon: 0.0,
            batch_size: 2,
            replay_capacity: 16,
            min_replay_size: 2,
            train_interval: 1,
            target_update_interval: 1000,
            target_sync: TargetSync::Steps,
            double_q: false,
            seed: Some(7),
        }
    }

    fn table_agent(config: DqnConfig) -> DqnAgent<&'static str, usize, TableApproximator> {
        let encoder = OneHotEncoder::new(["A", "B", "T"]);
        DqnAgent::new(
            config,
            TableApproximator::new(3, 2),
            TableApproximator::new(3, 2),
            encoder,
            vec![0, 1],
            chain_actions,
        )
        .unwrap()
    }

    #[test]
    fn test_double_q_target_not_above_naive() {
        // Online overrates action 0, target overrates action 1.
        let mut agent = DqnAgent::new(
            small_config(),
            TableApproximator::constant(&[5.0, 0.0]),
            TableApproximator::constant(&[0.0, 0.0]),
            ConstantEncoder,
            vec![0usize, 1],
            chain_actions,
        )
        .unwrap();
        agent.target_mut().load_parameters(vec![vec![1.0], vec![3.0]]);

        let batch = vec![Transition::new("A", 0, "B", 1.0, false)];
        let naive = agent.td_targets(&batch, false).unwrap();
        let double = agent.td_targets(&batch, true).unwrap();
        assert_eq!(naive, vec![1.0 + 0.5 * 3.0]);
        assert_eq!(double, vec![1.0 + 0.5 * 1.0]);
        assert!(double[0] <= naive[0]);
    }

    #[test]
    fn test_double_q_never_exceeds_naive_for_biased_target() {
        // A fixed positive bias on action 1 in the target network.
        let mut agent = table_agent(small_config());
        agent
            .target_mut()
            .load_parameters(vec![vec![0.2, -0.4, 0.0], vec![2.2, 1.6, 0.0]]);
        agent
            .online_mut()
            .load_parameters(vec![vec![0.7, 0.1, 0.0], vec![0.3, 0.9, 0.0]]);

        let batch = vec![
            Transition::new("A", 0, "B", 0.0, false),
            Transition::new("B", 1, "A", -1.0, false),
            Transition::new("B", 0, "T", 2.0, true),
        ];
        let naive = agent.td_targets(&batch, false).unwrap();
        let double = agent.td_targets(&batch, true).unwrap();
        for (d, n) in double.iter().zip(&naive) {
            assert!(d <= n, "double {d} > naive {n}");
        }
        assert_eq!(naive[2], 2.0);
        assert_eq!(double[2], 2.0);
    }

    #[test]
    fn test_terminal_target_is_reward() {
        let agent = table_agent(small_config());
        let targets = agent
            .td_targets(&[Transition::new("B", 1, "T", 10.0, true)], true)
            .unwrap();
        assert_eq!(targets, vec![10.0]);
    }

    #[test]
    fn test_target_synced_at_construction() {
        let mut online = TableApproximator::new(3, 2);
        online.weights[1][0] = 4.0;
        let agent = DqnAgent::new(
            small_config(),
            online,
            TableApproximator::new(3, 2),
            OneHotEncoder::new(["A", "B", "T"]),
            vec![0, 1],
            chain_actions,
        )
        .unwrap();
        assert_eq!(agent.target().weights, agent.online().weights);
    }

    #[test]
    fn test_no_fit_until_buffer_reaches_threshold() {
        let mut agent = table_agent(DqnConfig {
            min_replay_size: 3,
            ..small_config()
        });
        let t = Transition::new("A", 1, "T", 1.0, true);

        assert_eq!(agent.update(&t).unwrap().loss, None);
        assert_eq!(agent.update(&t).unwrap().loss, None);
        assert!(agent.update(&t).unwrap().loss.is_some());
        assert_eq!(agent.online().fits, 1);
        assert_eq!(agent.replay_buffer().len(), 3);
    }

    #[test]
    fn test_train_interval_spaces_fits() {
        let mut agent = table_agent(DqnConfig {
            train_interval: 3,
            ..small_config()
        });
        let t = Transition::new("A", 1, "T", 1.0, true);
        for _ in 0..9 {
            agent.update(&t).unwrap();
        }
        assert_eq!(agent.train_steps(), 3);
    }

    #[test]
    fn test_target_sync_every_n_steps() {
        let mut agent = table_agent(DqnConfig {
            target_update_interval: 4,
            ..small_config()
        });
        let t = Transition::new("A", 1, "T", 1.0, true);
        for _ in 0..3 {
            agent.update(&t).unwrap();
        }
        assert_ne!(agent.target().weights, agent.online().weights);
        agent.update(&t).unwrap();
        assert_eq!(agent.target().weights, agent.online().weights);
    }

    #[test]
    fn test_target_sync_every_n_episodes() {
        let mut agent = table_agent(DqnConfig {
            target_update_interval: 2,
            target_sync: TargetSync::Episodes,
            ..small_config()
        });
        let t = Transition::new("A", 1, "T", 1.0, true);
        for _ in 0..4 {
            agent.update(&t).unwrap();
        }
        agent.stop_episode();
        assert_ne!(agent.target().weights, agent.online().weights);
        agent.stop_episode();
        assert_eq!(agent.target().weights, agent.online().weights);
    }

    #[test]
    fn test_learns_exit_value() {
        let mut agent = table_agent(small_config());
        let t = Transition::new("A", 1, "T", 4.0, true);
        for _ in 0..50 {
            agent.update(&t).unwrap();
        }
        assert!((agent.get_q_value(&"A", &1) - 4.0).abs() < 1e-3);
        assert_eq!(agent.get_policy(&"A"), Some(1));
        assert!((agent.get_value(&"A") - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_trainer_reports_fit_loss() {
        let mut mdp = TabularMdp::new(0.5);
        mdp.add_transition("A", 0, "B", 1.0, 0.0)
            .add_transition("A", 1, "B", 1.0, 0.0)
            .add_transition("B", 0, "T", 1.0, 1.0)
            .add_transition("B", 1, "T", 1.0, 1.0)
            .set_terminal("T");
        let mut env = MdpEnvironment::with_seed(mdp, "A", 5);
        let mut agent = table_agent(small_config());
        let trainer = Trainer::new(TrainerConfig {
            num_episodes: 5,
            ..Default::default()
        })
        .unwrap();

        let report = trainer.train(&mut agent, &mut env).unwrap();
        assert!(agent.train_steps() > 0);
        assert!(report.average_loss > 0.0);
    }

    #[test]
    fn test_greedy_action_uses_online_network() {
        let mut agent = table_agent(small_config());
        agent
            .online_mut()
            .load_parameters(vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        for _ in 0..10 {
            assert_eq!(agent.get_action(&"A").unwrap(), 1);
        }
    }

    #[test]
    fn test_no_legal_actions_is_error() {
        let mut agent = table_agent(small_config());
        assert!(matches!(
            agent.get_action(&"T"),
            Err(StateError::NoLegalActions { .. })
        ));
    }

    #[test]
    fn test_config_errors_at_construction() {
        let build = |config: DqnConfig, outputs: usize| {
            DqnAgent::new(
                config,
                TableApproximator::new(3, outputs),
                TableApproximator::new(3, outputs),
                OneHotEncoder::new(["A", "B", "T"]),
                vec![0usize, 1],
                chain_actions,
            )
            .err()
        };
        assert!(build(
            DqnConfig {
                batch_size: 17,
                ..small_config()
            },
            2
        )
        .is_some());
        assert!(build(
            DqnConfig {
                batch_size: 0,
                ..small_config()
            },
            2
        )
        .is_some());
        assert!(build(
            DqnConfig {
                discount: 1.2,
                ..small_config()
            },
            2
        )
        .is_some());
        assert!(build(small_config(), 3).is_some());
        assert!(build(small_config(), 2).is_none());
    }

    #[test]
    fn test_nan_bootstrap_value_propagates() {
        let mut agent = DqnAgent::new(
            small_config(),
            TableApproximator::constant(&[5.0, 0.0]),
            TableApproximator::constant(&[0.0, 0.0]),
            ConstantEncoder,
            vec![0usize, 1],
            chain_actions,
        )
        .unwrap();
        agent
            .target_mut()
            .load_parameters(vec![vec![1.0], vec![f32::NAN]]);

        let batch = vec![Transition::new("A", 0, "B", 1.0, false)];
        let naive = agent.td_targets(&batch, false).unwrap();
        assert!(naive[0].is_nan());
        // Online picks action 0, whose target value is finite
        let double = agent.td_targets(&batch, true).unwrap();
        assert_eq!(double, vec![1.5]);

        agent
            .online_mut()
            .load_parameters(vec![vec![1.0], vec![f32::NAN]]);
        assert!(agent.get_value(&"A").is_nan());
        assert_eq!(agent.get_policy(&"A"), Some(1));
    }

    #[test]
    fn test_clear_replay_empties_buffer() {
        let mut agent = table_agent(DqnConfig {
            min_replay_size: 4,
            ..small_config()
        });
        let t = Transition::new("A", 1, "T", 1.0, true);
        for _ in 0..3 {
            agent.update(&t).unwrap();
        }
        agent.clear_replay();
        assert!(agent.replay_buffer().is_empty());
        assert_eq!(agent.step_count(), 3);

        // Fitting waits for the buffer to refill
        for _ in 0..3 {
            assert_eq!(agent.update(&t).unwrap().loss, None);
        }
        assert!(agent.update(&t).unwrap().loss.is_some());
    }

    #[test]
    fn test_restore_rejects_invalid_config() {
        let mut agent = table_agent(small_config());
        let mut state = agent.training_state();
        state.config.target_update_interval = 0;
        assert!(agent.restore_training_state(state.clone()).is_err());

        state.config = DqnConfig {
            batch_size: 99,
            ..small_config()
        };
        assert!(agent.restore_training_state(state.clone()).is_err());

        state.config = small_config();
        state.epsilon = 1.5;
        assert!(agent.restore_training_state(state).is_err());

        // The live settings are untouched and updates still run
        assert_eq!(agent.config(), &small_config());
        let t = Transition::new("A", 1, "T", 1.0, true);
        for _ in 0..4 {
            agent.update(&t).unwrap();
        }
        assert_eq!(agent.train_steps(), 3);
    }

    #[test]
    fn test_restore_rebuilds_buffer_for_new_capacity() {
        let mut agent = table_agent(small_config());
        for reward in 0..6 {
            agent
                .update(&Transition::new("A", 1, "T", f64::from(reward), true))
                .unwrap();
        }
        let mut state = agent.training_state();
        state.config = DqnConfig {
            replay_capacity: 4,
            ..small_config()
        };
        agent.restore_training_state(state).unwrap();

        assert_eq!(agent.replay_buffer().capacity(), 4);
        let rewards: Vec<f64> = agent.replay_buffer().iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let mut agent = table_agent(small_config());
        let result = agent.update(&Transition::new("A", 7, "T", 1.0, true));
        assert!(matches!(result, Err(LearnerError::Config(_))));
        assert!(agent.replay_buffer().is_empty());
    }

    #[test]
    fn test_training_state_roundtrip() {
        let mut agent = table_agent(small_config());
        agent.set_epsilon(0.42);
        agent.update(&Transition::new("A", 1, "T", 1.0, true)).unwrap();
        let state = agent.training_state();

        let json = serde_json::to_string(&state).unwrap();
        let restored: DqnTrainingState = serde_json::from_str(&json).unwrap();

        let mut fresh = table_agent(DqnConfig::default());
        fresh.restore_training_state(restored).unwrap();
        assert_eq!(fresh.replay_buffer().capacity(), 16);
        assert_eq!(fresh.epsilon(), 0.42);
        assert_eq!(fresh.step_count(), 1);
        assert_eq!(fresh.config(), &small_config());
    }
}
