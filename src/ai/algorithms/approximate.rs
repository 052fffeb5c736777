use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ai::agent::{Agent, LearnerParams, UpdateMetrics};
use crate::ai::exploration::{argmax_first, build_rng, epsilon_greedy, max_value};
use crate::ai::features::FeatureExtractor;
use crate::error::{ConfigError, LearnerError, StateError};
use crate::mdp::{ActionFn, ActionKey, StateKey, Transition};

/// Serializable learner state for checkpointing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximateState {
    pub params: LearnerParams,
    pub episode_count: usize,
    pub weights: BTreeMap<String, f64>,
}

/// Approximate Q-learning over a linear function of sparse features.
///
/// `Q(s, a) = Σ w[f] · x[f]` where `x = features(s, a)`. The weight vector is
/// shared across actions and grows as new feature names appear; nothing bounds
/// it, so unscaled features can make it diverge.
pub struct ApproximateQAgent<S, A> {
    weights: HashMap<String, f64>,
    extractor: Box<dyn FeatureExtractor<S, A>>,
    params: LearnerParams,
    action_fn: ActionFn<S, A>,
    rng: StdRng,
    episode_count: usize,
}

impl<S: StateKey, A: ActionKey> ApproximateQAgent<S, A> {
    pub fn new(
        params: LearnerParams,
        extractor: impl FeatureExtractor<S, A> + 'static,
        action_fn: impl Fn(&S) -> Vec<A> + 'static,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(ApproximateQAgent {
            weights: HashMap::new(),
            extractor: Box::new(extractor),
            rng: build_rng(params.seed),
            params,
            action_fn: Box::new(action_fn),
            episode_count: 0,
        })
    }

    pub fn legal_actions(&self, state: &S) -> Vec<A> {
        (self.action_fn)(state)
    }

    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    pub fn weight(&self, feature: &str) -> f64 {
        self.weights.get(feature).copied().unwrap_or(0.0)
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

    pub fn snapshot(&self) -> ApproximateState {
        ApproximateState {
            params: self.params,
            episode_count: self.episode_count,
            weights: self
                .weights
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    pub fn restore(&mut self, state: ApproximateState) {
        self.params = state.params;
        self.episode_count = state.episode_count;
        self.weights = state.weights.into_iter().collect();
    }
}

impl<S: StateKey, A: ActionKey> Agent<S, A> for ApproximateQAgent<S, A> {
    fn name(&self) -> &str {
        "Approximate Q-Learning"
    }

    fn get_action(&mut self, state: &S) -> Result<A, StateError> {
        let legal = self.legal_actions(state);
        let scores: Vec<f64> = legal.iter().map(|a| self.get_q_value(state, a)).collect();
        let indices: Vec<usize> = (0..legal.len()).collect();
        epsilon_greedy(&mut self.rng, self.params.epsilon, &indices, |&i| scores[i])
            .map(|i| legal[i].clone())
            .ok_or_else(|| StateError::no_legal_actions(state))
    }

    fn update(&mut self, transition: &Transition<S, A>) -> Result<UpdateMetrics, LearnerError> {
        let next_value = if transition.done {
            0.0
        } else {
            self.get_value(&transition.next_state)
        };
        let target = transition.reward + self.params.discount * next_value;
        let delta = target - self.get_q_value(&transition.state, &transition.action);

        let step = self.params.alpha * delta;
        for (name, value) in self
            .extractor
            .features(&transition.state, &transition.action)
        {
            *self.weights.entry(name).or_insert(0.0) += step * value;
        }

        Ok(UpdateMetrics {
            td_error: Some(delta),
            loss: None,
        })
    }

    fn get_q_value(&self, state: &S, action: &A) -> f64 {
        self.extractor
            .features(state, action)
            .iter()
            .map(|(name, value)| self.weight(name) * value)
            .sum()
    }

    fn get_value(&self, state: &S) -> f64 {
        let legal = self.legal_actions(state);
        if legal.is_empty() {
            return 0.0;
        }
        max_value(legal.iter().map(|a| self.get_q_value(state, a)))
    }

    fn get_policy(&self, state: &S) -> Option<A> {
        argmax_first(&self.legal_actions(state), |a| self.get_q_value(state, a))
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
