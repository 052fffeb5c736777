use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DecisionProcess, ExperienceSource};
use crate::error::StateError;

/// Plays a [`DecisionProcess`] forward by sampling its transition
/// distribution, turning a model into something online learners can act in.
pub struct MdpEnvironment<M: DecisionProcess> {
    mdp: M,
    start: M::State,
    state: M::State,
    rng: StdRng,
}

impl<M: DecisionProcess> MdpEnvironment<M> {
    pub fn new(mdp: M, start: M::State) -> Self {
        Self::with_rng(mdp, start, StdRng::from_os_rng())
    }

    pub fn with_seed(mdp: M, start: M::State, seed: u64) -> Self {
        Self::with_rng(mdp, start, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mdp: M, start: M::State, rng: StdRng) -> Self {
        MdpEnvironment {
            mdp,
            state: start.clone(),
            start,
            rng,
        }
    }

    pub fn mdp(&self) -> &M {
        &self.mdp
    }

    /// Draw a successor of `(state, action)` according to its probabilities.
    fn sample_successor(
        &mut self,
        state: &M::State,
        action: &M::Action,
    ) -> Result<M::State, StateError> {
        let successors = self.mdp.transitions(state, action)?;
        let draw: f64 = self.rng.random_range(0.0..1.0);
        let mut cumulative = 0.0;
        for (next, p) in &successors {
            cumulative += p;
            if draw < cumulative {
                return Ok(next.clone());
            }
        }
        // Rounding can leave `cumulative` a hair below 1.0.
        successors
            .last()
            .map(|(next, _)| next.clone())
            .ok_or_else(|| StateError::no_legal_actions(state))
    }
}

impl<M: DecisionProcess> ExperienceSource for MdpEnvironment<M> {
    type State = M::State;
    type Action = M::Action;

    fn current_state(&self) -> M::State {
        self.state.clone()
    }

    fn legal_actions(&self, state: &M::State) -> Vec<M::Action> {
        self.mdp.actions(state)
    }

    fn do_action(&mut self, action: &M::Action) -> Result<(M::State, f64), StateError> {
        let state = self.state.clone();
        let next = self.sample_successor(&state, action)?;
        let reward = self.mdp.reward(&state, action, &next)?;
        self.state = next.clone();
        Ok((next, reward))
    }

    fn is_terminal(&self, state: &M::State) -> bool {
        self.mdp.is_terminal(state)
    }

    fn reset(&mut self) {
        self.state = self.start.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::{GridAction, GridState, Gridworld, TabularMdp};

    #[test]
    fn test_deterministic_step() {
        let mut mdp = TabularMdp::new(0.9);
        mdp.add_transition("A", "exit", "T", 1.0, 4.0).set_terminal("T");
        let mut env = MdpEnvironment::with_seed(mdp, "A", 7);

        let (next, reward) = env.do_action(&"exit").unwrap();
        assert_eq!(next, "T");
        assert_eq!(reward, 4.0);
        assert!(env.is_terminal(&env.current_state()));
        assert!(env.do_action(&"exit").is_err());

        env.reset();
        assert_eq!(env.current_state(), "A");
    }

    #[test]
    fn test_noise_frequencies() {
        let grid = Gridworld::named("book").unwrap();
        let mut env = MdpEnvironment::with_seed(grid, GridState::Cell(0, 0), 3);
        let mut north = 0;
        let trials = 2000;
        for _ in 0..trials {
            env.reset();
            let (next, _) = env.do_action(&GridAction::North).unwrap();
            if next == GridState::Cell(0, 1) {
                north += 1;
            }
        }
        let frac = north as f64 / trials as f64;
        assert!((frac - 0.8).abs() < 0.05, "intended move frequency {frac}");
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let run = |seed| {
            let grid = Gridworld::named("book").unwrap();
            let mut env = MdpEnvironment::with_seed(grid, GridState::Cell(0, 0), seed);
            (0..20)
                .map(|_| {
                    if env.is_terminal(&env.current_state()) {
                        env.reset();
                    }
                    env.do_action(&GridAction::East).unwrap().0
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }
}
