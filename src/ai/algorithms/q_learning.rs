use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ai::agent::{Agent, LearnerParams, UpdateMetrics};
use crate::ai::exploration::{argmax_first, build_rng, epsilon_greedy};
use crate::ai::q_table::{QEntry, QTable};
use crate::error::{ConfigError, LearnerError, StateError};
use crate::mdp::{ActionFn, ActionKey, StateKey, Transition};

/// Serializable learner state for checkpointing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QLearningState<S, A> {
    pub params: LearnerParams,
    pub episode_count: usize,
    pub q_values: Vec<QEntry<S, A>>,
}

/// Tabular Q-learning agent (off-policy TD control).
///
/// Every observed transition moves `Q(s, a)` toward
/// `r + γ max_a' Q(s', a')` by a fraction `alpha`; terminal successors are
/// worth 0.
pub struct QLearningAgent<S, A> {
    q_table: QTable<S, A>,
    params: LearnerParams,
    action_fn: ActionFn<S, A>,
    rng: StdRng,
    episode_count: usize,
}

impl<S: StateKey, A: ActionKey> QLearningAgent<S, A> {
    pub fn new(
        params: LearnerParams,
        action_fn: impl Fn(&S) -> Vec<A> + 'static,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(QLearningAgent {
            q_table: QTable::new(),
            rng: build_rng(params.seed),
            params,
            action_fn: Box::new(action_fn),
            episode_count: 0,
        })
    }

    pub fn legal_actions(&self, state: &S) -> Vec<A> {
        (self.action_fn)(state)
    }

    pub fn q_table(&self) -> &QTable<S, A> {
        &self.q_table
    }

    pub fn params(&self) -> &LearnerParams {
        &self.params
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.params.alpha = alpha;
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    /// Value used to bootstrap from the successor of `transition`.
    fn successor_value(&self, transition: &Transition<S, A>) -> f64 {
        if transition.done {
            0.0
        } else {
            self.get_value(&transition.next_state)
        }
    }

    pub fn snapshot(&self) -> QLearningState<S, A> {
        QLearningState {
            params: self.params,
            episode_count: self.episode_count,
            q_values: self.q_table.entries(),
        }
    }

    pub fn restore(&mut self, state: QLearningState<S, A>) {
        self.params = state.params;
        self.episode_count = state.episode_count;
        self.q_table = QTable::from_entries(state.q_values);
    }
}

impl<S: StateKey, A: ActionKey> Agent<S, A> for QLearningAgent<S, A> {
    fn name(&self) -> &str {
        "Q-Learning"
    }

    fn get_action(&mut self, state: &S) -> Result<A, StateError> {
        let legal = self.legal_actions(state);
        let table = &self.q_table;
        epsilon_greedy(&mut self.rng, self.params.epsilon, &legal, |a| {
            table.get(state, a)
        })
        .ok_or_else(|| StateError::no_legal_actions(state))
    }

    fn update(&mut self, transition: &Transition<S, A>) -> Result<UpdateMetrics, LearnerError> {
        let alpha = self.params.alpha;
        let sample = transition.reward + self.params.discount * self.successor_value(transition);
        let old = self.q_table.get(&transition.state, &transition.action);
        let new = (1.0 - alpha) * old + alpha * sample;
        self.q_table
            .set(transition.state.clone(), transition.action.clone(), new);

        Ok(UpdateMetrics {
            td_error: Some(sample - old),
            loss: None,
        })
    }

    fn get_q_value(&self, state: &S, action: &A) -> f64 {
        self.q_table.get(state, action)
    }

    fn get_value(&self, state: &S) -> f64 {
        self.q_table.max_q(state, &self.legal_actions(state))
    }

    fn get_policy(&self, state: &S) -> Option<A> {
        argmax_first(&self.legal_actions(state), |a| self.q_table.get(state, a))
    }

    fn epsilon(&self) -> f64 {
        self.params.epsilon
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.params.epsilon = epsilon;
    }

    fn stop_episode(&mut self) {
        self.episode_count += 1;
    }
}
