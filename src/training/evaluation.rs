use serde::{Deserialize, Serialize};

use crate::ai::{Agent, ValueIterationSolver};
use crate::error::LearnerError;
use crate::mdp::{DecisionProcess, ExperienceSource};
use crate::training::metrics::TrainingMetrics;
use crate::training::trainer::run_episode;

/// Average greedy return over `episodes` episodes.
///
/// Exploration is switched off for the run and the agent's epsilon is restored
/// afterwards, also when an episode fails. The agent does not learn.
pub fn evaluate<E, G>(
    agent: &mut G,
    env: &mut E,
    episodes: usize,
    max_steps: usize,
) -> Result<f64, LearnerError>
where
    E: ExperienceSource,
    G: Agent<E::State, E::Action> + ?Sized,
{
    let saved_epsilon = agent.epsilon();
    agent.set_epsilon(0.0);

    let mut metrics = TrainingMetrics::with_capacity(episodes);
    let mut outcome = Ok(());
    for _ in 0..episodes {
        match run_episode(agent, env, max_steps, None) {
            Ok(result) => metrics.record_episode(result),
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    agent.set_epsilon(saved_epsilon);
    outcome?;
    Ok(metrics.average_return(episodes))
}

/// How closely a learner's greedy policy matches a solved one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyComparison {
    /// Non-terminal states with at least one action.
    pub states_compared: usize,
    pub agreements: usize,
    /// Largest `|V_solver(s) - V_agent(s)|` over the compared states.
    pub max_value_gap: f64,
}

impl PolicyComparison {
    /// Fraction of compared states where the policies agree, 1.0 when nothing
    /// was compared.
    pub fn agreement(&self) -> f64 {
        if self.states_compared == 0 {
            1.0
        } else {
            self.agreements as f64 / self.states_compared as f64
        }
    }
}

/// Compare `agent`'s greedy policy and values with `solver`'s on every
/// non-terminal state of the solved process.
pub fn compare_policies<M, G>(
    solver: &ValueIterationSolver<'_, M>,
    agent: &G,
) -> PolicyComparison
where
    M: DecisionProcess,
    G: Agent<M::State, M::Action> + ?Sized,
{
    let mdp = solver.mdp();
    let mut comparison = PolicyComparison {
        states_compared: 0,
        agreements: 0,
        max_value_gap: 0.0,
    };
    for state in mdp.states() {
        if mdp.is_terminal(&state) || mdp.actions(&state).is_empty() {
            continue;
        }
        comparison.states_compared += 1;
        if solver.get_policy(&state) == agent.get_policy(&state) {
            comparison.agreements += 1;
        }
        let gap = (solver.get_value(&state) - agent.get_value(&state)).abs();
        comparison.max_value_gap = comparison.max_value_gap.max(gap);
    }
    comparison
}
