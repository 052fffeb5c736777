//! Action-selection helpers shared by the online learners.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Seeded generator when `seed` is given, OS entropy otherwise.
pub fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// True with probability `p`.
pub fn flip_coin(rng: &mut StdRng, p: f64) -> bool {
    rng.random_range(0.0..1.0) < p
}

/// Highest-scoring candidate, ties broken uniformly at random.
pub fn argmax_random_tie<A: Clone>(
    rng: &mut StdRng,
    candidates: &[A],
    score: impl Fn(&A) -> f64,
) -> Option<A> {
    let mut best = f64::NEG_INFINITY;
    let mut winners: Vec<&A> = Vec::new();
    for candidate in candidates {
        let value = score(candidate);
        if value > best {
            best = value;
            winners.clear();
            winners.push(candidate);
        } else if value == best {
            winners.push(candidate);
        }
    }
    if winners.is_empty() {
        // Every score was NaN; fall back to a uniform pick.
        return candidates.choose(rng).cloned();
    }
    winners.choose(rng).map(|a| (*a).clone())
}

/// Highest-scoring candidate, ties going to the earliest one.
///
/// A NaN score beats every number, so the first NaN candidate wins.
pub fn argmax_first<A: Clone>(candidates: &[A], score: impl Fn(&A) -> f64) -> Option<A> {
    let mut best: Option<(&A, f64)> = None;
    for candidate in candidates {
        let value = score(candidate);
        let replace = match best {
            None => true,
            Some((_, b)) => !b.is_nan() && (value > b || value.is_nan()),
        };
        if replace {
            best = Some((candidate, value));
        }
    }
    best.map(|(a, _)| a.clone())
}

/// Maximum of `values`, NaN if any value is NaN, `-inf` when empty.
pub fn max_value(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .fold(f64::NEG_INFINITY, |best, v| {
            if best.is_nan() || v <= best {
                best
            } else {
                v
            }
        })
}

/// Epsilon-greedy choice among `legal`: uniform with probability `epsilon`,
/// otherwise the best-scoring action with random tie-breaking.
pub fn epsilon_greedy<A: Clone>(
    rng: &mut StdRng,
    epsilon: f64,
    legal: &[A],
    score: impl Fn(&A) -> f64,
) -> Option<A> {
    if legal.is_empty() {
        return None;
    }
    if flip_coin(rng, epsilon) {
        return legal.choose(rng).cloned();
    }
    argmax_random_tie(rng, legal, score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_prefers_earliest_tie() {
        let actions = ["a", "b", "c"];
        let best = argmax_first(&actions, |a| if *a == "a" { 0.0 } else { 1.0 });
        assert_eq!(best, Some("b"));
    }

    #[test]
    fn test_argmax_first_surfaces_nan() {
        let actions = ["a", "b", "c", "d"];
        let scores = |a: &&str| match *a {
            "a" => 3.0,
            "b" => f64::NAN,
            "c" => 9.0,
            _ => f64::NAN,
        };
        assert_eq!(argmax_first(&actions, scores), Some("b"));
        let first_nan = argmax_first(&["x", "y"], |a| if *a == "x" { f64::NAN } else { 1.0 });
        assert_eq!(first_nan, Some("x"));
    }

    #[test]
    fn test_max_value_propagates_nan() {
        assert_eq!(max_value([1.0, 4.0, -2.0]), 4.0);
        assert!(max_value([1.0, f64::NAN, 4.0]).is_nan());
        assert!(max_value([f64::NAN, 4.0]).is_nan());
        assert_eq!(max_value([f64::INFINITY, 1.0]), f64::INFINITY);
        assert_eq!(max_value(std::iter::empty()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_argmax_random_tie_covers_all_maximizers() {
        let mut rng = build_rng(Some(5));
        let actions = [0usize, 1, 2, 3];
        let mut seen = [false; 4];
        for _ in 0..200 {
            let pick = argmax_random_tie(&mut rng, &actions, |a| if *a == 3 { -1.0 } else { 2.0 })
                .unwrap();
            seen[pick] = true;
        }
        assert_eq!(seen, [true, true, true, false]);
    }

    #[test]
    fn test_seeded_tie_break_is_reproducible() {
        let actions = [0usize, 1, 2, 3, 4];
        let run = || {
            let mut rng = build_rng(Some(42));
            (0..20)
                .map(|_| argmax_random_tie(&mut rng, &actions, |_| 0.0).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_epsilon_one_explores_every_action() {
        let mut rng = build_rng(Some(9));
        let actions = [0usize, 1, 2];
        let mut seen = [false; 3];
        for _ in 0..200 {
            let pick = epsilon_greedy(&mut rng, 1.0, &actions, |a| *a as f64).unwrap();
            seen[pick] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_epsilon_zero_is_greedy() {
        let mut rng = build_rng(Some(1));
        let actions = [0usize, 1, 2];
        for _ in 0..50 {
            assert_eq!(epsilon_greedy(&mut rng, 0.0, &actions, |a| *a as f64), Some(2));
        }
        assert_eq!(epsilon_greedy::<usize>(&mut rng, 0.0, &[], |_| 0.0), None);
    }
}
