use std::collections::HashMap;

use crate::ai::agent::validate_discount;
use crate::ai::exploration::argmax_first;
use crate::error::{ConfigError, LearnerError, StateError};
use crate::mdp::DecisionProcess;

/// Batch Bellman-optimality solver.
///
/// Each sweep builds a fresh value table from the previous one and swaps it in,
/// so a sweep never reads values written earlier in the same sweep. The solver
/// runs exactly the requested number of sweeps; there is no convergence test.
pub struct ValueIterationSolver<'a, M: DecisionProcess> {
    mdp: &'a M,
    values: HashMap<M::State, f64>,
    policy: HashMap<M::State, M::Action>,
    sweeps: usize,
}

impl<'a, M: DecisionProcess> ValueIterationSolver<'a, M> {
    /// Run `iterations` synchronous sweeps over `mdp`.
    pub fn solve(mdp: &'a M, iterations: usize) -> Result<Self, LearnerError> {
        validate_discount(mdp.discount())?;
        if iterations == 0 {
            return Err(ConfigError::Validation("iterations must be > 0".into()).into());
        }

        let mut solver = ValueIterationSolver {
            mdp,
            values: HashMap::new(),
            policy: HashMap::new(),
            sweeps: 0,
        };
        solver.run_sweeps(iterations)?;
        Ok(solver)
    }

    /// Continue from the current table for `count` more sweeps.
    pub fn run_sweeps(&mut self, count: usize) -> Result<(), StateError> {
        for _ in 0..count {
            self.sweep()?;
        }
        self.refresh_policy()?;
        tracing::debug!(
            sweeps = self.sweeps,
            states = self.values.len(),
            "value iteration finished"
        );
        Ok(())
    }

    fn sweep(&mut self) -> Result<(), StateError> {
        let mut next = HashMap::with_capacity(self.values.len());
        for state in self.mdp.states() {
            if self.mdp.is_terminal(&state) {
                let value = self.mdp.terminal_value(&state);
                next.insert(state, value);
                continue;
            }
            let actions = self.mdp.actions(&state);
            if actions.is_empty() {
                continue;
            }
            let mut best = f64::NEG_INFINITY;
            for action in &actions {
                let q = self.get_q_value(&state, action)?;
                if q > best || q.is_nan() {
                    best = q;
                }
            }
            next.insert(state, best);
        }
        self.values = next;
        self.sweeps += 1;
        Ok(())
    }

    fn refresh_policy(&mut self) -> Result<(), StateError> {
        let mut policy = HashMap::new();
        for state in self.mdp.states() {
            if let Some(action) = self.compute_policy(&state)? {
                policy.insert(state, action);
            }
        }
        self.policy = policy;
        Ok(())
    }

    fn compute_policy(&self, state: &M::State) -> Result<Option<M::Action>, StateError> {
        if self.mdp.is_terminal(state) {
            return Ok(None);
        }
        let actions = self.mdp.actions(state);
        let mut q_values = Vec::with_capacity(actions.len());
        for action in &actions {
            q_values.push(self.get_q_value(state, action)?);
        }
        let indices: Vec<usize> = (0..actions.len()).collect();
        Ok(argmax_first(&indices, |&i| q_values[i]).map(|i| actions[i].clone()))
    }

    /// Stored value of `state`. Terminal states report their fixed terminal
    /// value (normally 0); unseen states are 0.
    pub fn get_value(&self, state: &M::State) -> f64 {
        self.values.get(state).copied().unwrap_or(0.0)
    }

    /// One-step lookahead `Σ P(s'|s,a) [R(s,a,s') + γ V(s')]` on the current table.
    pub fn get_q_value(&self, state: &M::State, action: &M::Action) -> Result<f64, StateError> {
        let gamma = self.mdp.discount();
        let mut total = 0.0;
        for (next, probability) in self.mdp.transitions(state, action)? {
            let reward = self.mdp.reward(state, action, &next)?;
            total += probability * (reward + gamma * self.get_value(&next));
        }
        Ok(total)
    }

    /// Greedy action, ties broken by the state's action ordering. `None` for
    /// terminal states and states without actions.
    pub fn get_policy(&self, state: &M::State) -> Option<M::Action> {
        self.policy.get(state).cloned()
    }

    pub fn get_action(&self, state: &M::State) -> Option<M::Action> {
        self.get_policy(state)
    }

    pub fn values(&self) -> &HashMap<M::State, f64> {
        &self.values
    }

    pub fn policy(&self) -> &HashMap<M::State, M::Action> {
        &self.policy
    }

    /// Number of sweeps performed so far.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn mdp(&self) -> &M {
        self.mdp
    }
}
