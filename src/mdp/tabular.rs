use std::collections::{HashMap, HashSet};

use super::{ActionKey, DecisionProcess, StateKey};
use crate::error::StateError;

/// A decision process spelled out as an explicit transition table.
///
/// States and actions are reported in the order they were first added, which
/// is what the solver's deterministic tie-break follows.
#[derive(Debug, Clone)]
pub struct TabularMdp<S, A> {
    states: Vec<S>,
    known: HashSet<S>,
    terminal: HashMap<S, f64>,
    actions: HashMap<S, Vec<A>>,
    outcomes: HashMap<(S, A), Vec<Outcome<S>>>,
    discount: f64,
}

#[derive(Debug, Clone)]
struct Outcome<S> {
    next_state: S,
    probability: f64,
    reward: f64,
}

impl<S: StateKey, A: ActionKey> TabularMdp<S, A> {
    pub fn new(discount: f64) -> Self {
        TabularMdp {
            states: Vec::new(),
            known: HashSet::new(),
            terminal: HashMap::new(),
            actions: HashMap::new(),
            outcomes: HashMap::new(),
            discount,
        }
    }

    /// Register a state with no actions yet.
    pub fn add_state(&mut self, state: S) -> &mut Self {
        if self.known.insert(state.clone()) {
            self.states.push(state);
        }
        self
    }

    /// Add `next_state` as an outcome of `action` in `state`.
    ///
    /// Adding the same successor twice accumulates its probability; the most
    /// recent reward wins.
    pub fn add_transition(
        &mut self,
        state: S,
        action: A,
        next_state: S,
        probability: f64,
        reward: f64,
    ) -> &mut Self {
        self.add_state(state.clone());
        self.add_state(next_state.clone());

        let actions = self.actions.entry(state.clone()).or_default();
        if !actions.contains(&action) {
            actions.push(action.clone());
        }

        let outcomes = self.outcomes.entry((state, action)).or_default();
        match outcomes.iter_mut().find(|o| o.next_state == next_state) {
            Some(existing) => {
                existing.probability += probability;
                existing.reward = reward;
            }
            None => outcomes.push(Outcome {
                next_state,
                probability,
                reward,
            }),
        }
        self
    }

    pub fn set_terminal(&mut self, state: S) -> &mut Self {
        self.set_terminal_value(state, 0.0)
    }

    /// Mark `state` terminal with a fixed value other than zero.
    pub fn set_terminal_value(&mut self, state: S, value: f64) -> &mut Self {
        self.add_state(state.clone());
        self.terminal.insert(state, value);
        self
    }

    pub fn set_discount(&mut self, discount: f64) -> &mut Self {
        self.discount = discount;
        self
    }

    fn outcomes_for(&self, state: &S, action: &A) -> Result<&[Outcome<S>], StateError> {
        if self.terminal.contains_key(state) {
            return Err(StateError::terminal(state));
        }
        Ok(self
            .outcomes
            .get(&(state.clone(), action.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }
}

impl<S: StateKey, A: ActionKey> DecisionProcess for TabularMdp<S, A> {
    type State = S;
    type Action = A;

    fn states(&self) -> Vec<S> {
        self.states.clone()
    }

    fn actions(&self, state: &S) -> Vec<A> {
        if self.terminal.contains_key(state) {
            return Vec::new();
        }
        self.actions.get(state).cloned().unwrap_or_default()
    }

    fn transitions(&self, state: &S, action: &A) -> Result<Vec<(S, f64)>, StateError> {
        Ok(self
            .outcomes_for(state, action)?
            .iter()
            .map(|o| (o.next_state.clone(), o.probability))
            .collect())
    }

    fn reward(&self, state: &S, action: &A, next_state: &S) -> Result<f64, StateError> {
        Ok(self
            .outcomes_for(state, action)?
            .iter()
            .find(|o| &o.next_state == next_state)
            .map(|o| o.reward)
            .unwrap_or(0.0))
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn is_terminal(&self, state: &S) -> bool {
        self.terminal.contains_key(state)
    }

    fn terminal_value(&self, state: &S) -> f64 {
        self.terminal.get(state).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> TabularMdp<&'static str, &'static str> {
        let mut mdp = TabularMdp::new(0.5);
        mdp.add_transition("A", "exit", "T", 1.0, 10.0)
            .set_terminal("T");
        mdp
    }

    #[test]
    fn test_states_in_insertion_order() {
        let mdp = chain();
        assert_eq!(mdp.states(), vec!["A", "T"]);
    }

    #[test]
    fn test_terminal_has_no_actions() {
        let mdp = chain();
        assert!(mdp.actions(&"T").is_empty());
        assert_eq!(mdp.actions(&"A"), vec!["exit"]);
    }

    #[test]
    fn test_transitions_on_terminal_fail() {
        let mdp = chain();
        assert_eq!(
            mdp.transitions(&"T", &"exit"),
            Err(StateError::terminal(&"T"))
        );
        assert!(mdp.reward(&"T", &"exit", &"A").is_err());
    }

    #[test]
    fn test_duplicate_successor_accumulates_probability() {
        let mut mdp = TabularMdp::new(0.9);
        mdp.add_transition("A", "go", "B", 0.25, 1.0)
            .add_transition("A", "go", "B", 0.25, 2.0)
            .add_transition("A", "go", "C", 0.5, 0.0);
        let t = mdp.transitions(&"A", &"go").unwrap();
        assert_eq!(t, vec![("B", 0.5), ("C", 0.5)]);
        assert_eq!(mdp.reward(&"A", &"go", &"B").unwrap(), 2.0);
        assert_eq!(mdp.reward(&"A", &"go", &"A").unwrap(), 0.0);
    }

    #[test]
    fn test_terminal_value_override() {
        let mut mdp: TabularMdp<&str, &str> = TabularMdp::new(0.5);
        mdp.set_terminal_value("goal", 10.0).set_terminal("pit");
        assert_eq!(mdp.terminal_value(&"goal"), 10.0);
        assert_eq!(mdp.terminal_value(&"pit"), 0.0);
        assert!(mdp.is_terminal(&"goal"));
    }
}
