use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LearnerError, StateError};
use crate::mdp::Transition;

/// Exploration, learning-rate and discount settings owned by one learner.
///
/// Drivers that anneal `epsilon` or `alpha` between episodes do so through the
/// learner's setters; learners never decay these on their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerParams {
    pub epsilon: f64,
    pub alpha: f64,
    pub discount: f64,
    pub seed: Option<u64>,
}

impl Default for LearnerParams {
    fn default() -> Self {
        LearnerParams {
            epsilon: 0.05,
            alpha: 0.2,
            discount: 0.8,
            seed: None,
        }
    }
}

impl LearnerParams {
    pub fn new(epsilon: f64, alpha: f64, discount: f64) -> Self {
        LearnerParams {
            epsilon,
            alpha,
            discount,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(ConfigError::Validation("epsilon must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::Validation("alpha must be in [0, 1]".into()));
        }
        validate_discount(self.discount)
    }
}

pub(crate) fn validate_discount(discount: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&discount) {
        return Err(ConfigError::Validation(format!(
            "discount must be in [0, 1], got {discount}"
        )));
    }
    Ok(())
}

/// Metrics returned from a learning update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMetrics {
    /// Temporal-difference error of the update (tabular and linear learners).
    pub td_error: Option<f64>,
    /// Batch loss when a network was fitted (deep learner).
    pub loss: Option<f32>,
}

/// Driver-facing interface shared by the online learners.
pub trait Agent<S, A> {
    /// Return the agent's display name.
    fn name(&self) -> &str;

    /// Choose an action in `state`, exploring with probability epsilon.
    fn get_action(&mut self, state: &S) -> Result<A, StateError>;

    /// Learn from one observed transition.
    fn update(&mut self, transition: &Transition<S, A>) -> Result<UpdateMetrics, LearnerError>;

    fn get_q_value(&self, state: &S, action: &A) -> f64;

    /// `max_a Q(state, a)` over legal actions, 0.0 when there are none.
    fn get_value(&self, state: &S) -> f64;

    /// Greedy action without exploration; ties go to the first legal action.
    fn get_policy(&self, state: &S) -> Option<A>;

    fn epsilon(&self) -> f64;

    fn set_epsilon(&mut self, epsilon: f64);

    /// Called by drivers before the first step of an episode.
    fn start_episode(&mut self) {}

    /// Called by drivers after the last step of an episode.
    fn stop_episode(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        LearnerParams::default()
            .validate()
            .expect("default params should be valid");
    }

    #[test]
    fn test_rejects_discount_out_of_range() {
        assert!(LearnerParams::new(0.1, 0.5, 1.5).validate().is_err());
        assert!(LearnerParams::new(0.1, 0.5, -0.1).validate().is_err());
        assert!(LearnerParams::new(0.1, 0.5, 1.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_epsilon_and_alpha_out_of_range() {
        assert!(LearnerParams::new(1.1, 0.5, 0.9).validate().is_err());
        assert!(LearnerParams::new(0.1, -0.5, 0.9).validate().is_err());
    }
}
