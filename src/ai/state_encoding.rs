use std::collections::HashMap;

use crate::mdp::{GridState, Gridworld, StateKey};

/// Dense `f32` encoding of a state, the network-side input format.
pub trait StateEncoder<S> {
    /// Length of every encoded vector.
    fn dim(&self) -> usize;

    fn encode(&self, state: &S) -> Vec<f32>;
}

/// One input per known state. Unknown states encode as all zeros.
#[derive(Debug, Clone)]
pub struct OneHotEncoder<S> {
    index: HashMap<S, usize>,
}

impl<S: StateKey> OneHotEncoder<S> {
    pub fn new(states: impl IntoIterator<Item = S>) -> Self {
        let mut index = HashMap::new();
        for state in states {
            let next = index.len();
            index.entry(state).or_insert(next);
        }
        OneHotEncoder { index }
    }
}

impl<S: StateKey> StateEncoder<S> for OneHotEncoder<S> {
    fn dim(&self) -> usize {
        self.index.len()
    }

    fn encode(&self, state: &S) -> Vec<f32> {
        let mut data = vec![0.0f32; self.index.len()];
        if let Some(&i) = self.index.get(state) {
            data[i] = 1.0;
        }
        data
    }
}

/// The agent's cell one-hot over the full grid (walls included), followed by
/// a terminal flag.
#[derive(Debug, Clone, Copy)]
pub struct GridEncoder {
    width: usize,
    height: usize,
}

impl GridEncoder {
    pub fn for_grid(grid: &Gridworld) -> Self {
        GridEncoder {
            width: grid.width(),
            height: grid.height(),
        }
    }
}

impl StateEncoder<GridState> for GridEncoder {
    fn dim(&self) -> usize {
        self.width * self.height + 1
    }

    fn encode(&self, state: &GridState) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dim()];
        match *state {
            GridState::Cell(x, y) if x < self.width && y < self.height => {
                data[y * self.width + x] = 1.0;
            }
            GridState::Cell(..) => {}
            GridState::Terminal => data[self.width * self.height] = 1.0,
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_shape_and_values() {
        let encoder = OneHotEncoder::new(["a", "b", "c"]);
        assert_eq!(encoder.dim(), 3);
        assert_eq!(encoder.encode(&"b"), vec![0.0, 1.0, 0.0]);
        assert_eq!(encoder.encode(&"zzz"), vec![0.0; 3]);
    }

    #[test]
    fn test_one_hot_ignores_duplicates() {
        let encoder = OneHotEncoder::new(["a", "b", "a"]);
        assert_eq!(encoder.dim(), 2);
        assert_eq!(encoder.encode(&"a"), vec![1.0, 0.0]);
    }

    #[test]
    fn test_grid_encoder_layout() {
        let grid = Gridworld::named("book").unwrap();
        let encoder = GridEncoder::for_grid(&grid);
        assert_eq!(encoder.dim(), 4 * 3 + 1);

        let cell = encoder.encode(&GridState::Cell(1, 2));
        assert_eq!(cell.iter().filter(|&&v| v == 1.0).count(), 1);
        assert_eq!(cell[2 * 4 + 1], 1.0);

        let terminal = encoder.encode(&GridState::Terminal);
        assert_eq!(terminal[12], 1.0);
    }
}
