use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ai::exploration::max_value;
use crate::mdp::{ActionKey, StateKey};

/// Q-values keyed by state, then action. Unseen pairs read as 0.0.
#[derive(Debug, Clone)]
pub struct QTable<S, A> {
    values: HashMap<S, HashMap<A, f64>>,
}

/// One stored Q-value, the unit of a serialized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QEntry<S, A> {
    pub state: S,
    pub action: A,
    pub value: f64,
}

impl<S: StateKey, A: ActionKey> QTable<S, A> {
    pub fn new() -> Self {
        QTable {
            values: HashMap::new(),
        }
    }

    pub fn get(&self, state: &S, action: &A) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, state: S, action: A, value: f64) {
        self.values.entry(state).or_default().insert(action, value);
    }

    /// Maximum over `actions`, 0.0 when the slice is empty. NaN entries
    /// propagate.
    pub fn max_q(&self, state: &S, actions: &[A]) -> f64 {
        if actions.is_empty() {
            return 0.0;
        }
        max_value(actions.iter().map(|a| self.get(state, a)))
    }

    /// Number of stored `(state, action)` pairs.
    pub fn len(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<QEntry<S, A>> {
        self.values
            .iter()
            .flat_map(|(state, row)| {
                row.iter().map(move |(action, value)| QEntry {
                    state: state.clone(),
                    action: action.clone(),
                    value: *value,
                })
            })
            .collect()
    }

    pub fn from_entries(entries: Vec<QEntry<S, A>>) -> Self {
        let mut table = QTable::new();
        for entry in entries {
            table.set(entry.state, entry.action, entry.value);
        }
        table
    }
}

impl<S: StateKey, A: ActionKey> Default for QTable<S, A> {
    fn default() -> Self {
        Self::new()
    }
}
