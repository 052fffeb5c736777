//! Decision-process contracts consumed by the solvers and learners, plus the
//! reference environments: an explicit table-built MDP, a noisy grid world, and
//! an environment adapter that samples any MDP step by step.

mod environment;
mod gridworld;
mod tabular;

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::StateError;

pub use environment::MdpEnvironment;
pub use gridworld::{GridAction, GridState, Gridworld, GRID_NAMES};
pub use tabular::TabularMdp;

/// Bound for anything used as a state key.
pub trait StateKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> StateKey for T {}

/// Bound for anything used as an action.
pub trait ActionKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> ActionKey for T {}

/// Legal-action lookup handed to the online learners.
pub type ActionFn<S, A> = Box<dyn Fn(&S) -> Vec<A>>;

/// One observed step: `(state, action, next_state, reward, done)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, A> {
    pub state: S,
    pub action: A,
    pub next_state: S,
    pub reward: f64,
    pub done: bool,
}

impl<S, A> Transition<S, A> {
    pub fn new(state: S, action: A, next_state: S, reward: f64, done: bool) -> Self {
        Transition {
            state,
            action,
            next_state,
            reward,
            done,
        }
    }
}

/// Read-only model of a discrete Markov decision process.
///
/// Transition probabilities for a `(state, action)` pair must sum to 1.0; the
/// solvers do not renormalize them.
pub trait DecisionProcess {
    type State: StateKey;
    type Action: ActionKey;

    /// Every state of the process, terminal ones included.
    fn states(&self) -> Vec<Self::State>;

    /// Legal actions in `state`, empty when the state is terminal.
    fn actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Successor distribution as `(next_state, probability)` pairs.
    fn transitions(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Vec<(Self::State, f64)>, StateError>;

    fn reward(
        &self,
        state: &Self::State,
        action: &Self::Action,
        next_state: &Self::State,
    ) -> Result<f64, StateError>;

    fn discount(&self) -> f64;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Fixed value of a terminal state. Zero unless the process overrides it.
    fn terminal_value(&self, _state: &Self::State) -> f64 {
        0.0
    }
}

/// Something an online learner can act in.
pub trait ExperienceSource {
    type State: StateKey;
    type Action: ActionKey;

    fn current_state(&self) -> Self::State;

    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Execute `action` from the current state, returning `(next_state, reward)`.
    fn do_action(&mut self, action: &Self::Action) -> Result<(Self::State, f64), StateError>;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Return to the start state.
    fn reset(&mut self);
}
