//! Sparse `(state, action)` features for the linear approximate learner.

use std::collections::HashMap;
use std::fmt::Debug;

use crate::mdp::{GridAction, GridState, Gridworld};

/// Feature name to value. Absent names are implicitly 0.
pub type FeatureVector = HashMap<String, f64>;

/// Maps a `(state, action)` pair to a sparse feature vector.
pub trait FeatureExtractor<S, A> {
    fn features(&self, state: &S, action: &A) -> FeatureVector;
}

impl<S, A, F> FeatureExtractor<S, A> for F
where
    F: Fn(&S, &A) -> FeatureVector,
{
    fn features(&self, state: &S, action: &A) -> FeatureVector {
        self(state, action)
    }
}

/// One indicator feature per `(state, action)` pair.
///
/// With these features the linear learner reduces to tabular Q-learning.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityExtractor;

impl<S: Debug, A: Debug> FeatureExtractor<S, A> for IdentityExtractor {
    fn features(&self, state: &S, action: &A) -> FeatureVector {
        let mut features = FeatureVector::new();
        features.insert(format!("{state:?}|{action:?}"), 1.0);
        features
    }
}

/// Position features for grid-world states.
///
/// Emits a `bias`, an indicator for the action, and per-action coordinates
/// scaled into `[0, 1]` by the grid size. The terminal state only gets the
/// bias and action indicator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateExtractor {
    width: usize,
    height: usize,
}

impl CoordinateExtractor {
    pub fn new(width: usize, height: usize) -> Self {
        CoordinateExtractor {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn for_grid(grid: &Gridworld) -> Self {
        Self::new(grid.width(), grid.height())
    }
}

impl FeatureExtractor<GridState, GridAction> for CoordinateExtractor {
    fn features(&self, state: &GridState, action: &GridAction) -> FeatureVector {
        let mut features = FeatureVector::new();
        features.insert("bias".to_string(), 1.0);
        features.insert(format!("action={action}"), 1.0);
        if let GridState::Cell(x, y) = *state {
            features.insert(format!("{action}:x"), x as f64 / self.width as f64);
            features.insert(format!("{action}:y"), y as f64 / self.height as f64);
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_single_indicator() {
        let f = IdentityExtractor.features(&"A", &"exit");
        assert_eq!(f.len(), 1);
        assert_eq!(f.get("\"A\"|\"exit\""), Some(&1.0));
    }

    #[test]
    fn test_identity_distinguishes_pairs() {
        let a = IdentityExtractor.features(&1u8, &'l');
        let b = IdentityExtractor.features(&1u8, &'r');
        assert_ne!(a.keys().next(), b.keys().next());
    }

    #[test]
    fn test_coordinate_features_scaled() {
        let extractor = CoordinateExtractor::new(4, 3);
        let f = extractor.features(&GridState::Cell(2, 1), &GridAction::North);
        assert_eq!(f.get("bias"), Some(&1.0));
        assert_eq!(f.get("action=north"), Some(&1.0));
        assert_eq!(f.get("north:x"), Some(&0.5));
        assert!((f["north:y"] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_coordinate_terminal_has_no_position() {
        let extractor = CoordinateExtractor::new(4, 3);
        let f = extractor.features(&GridState::Terminal, &GridAction::Exit);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_closure_as_extractor() {
        let extractor = |s: &u32, _a: &u32| {
            let mut f = FeatureVector::new();
            f.insert("s".to_string(), *s as f64);
            f
        };
        assert_eq!(extractor.features(&3, &0)["s"], 3.0);
    }
}
