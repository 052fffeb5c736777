mod approximate;
mod dqn;
mod q_learning;
mod value_iteration;

pub use approximate::{ApproximateQAgent, ApproximateState};
pub use dqn::{DqnAgent, DqnConfig, DqnTrainingState, TargetSync};
pub use q_learning::{QLearningAgent, QLearningState};
pub use value_iteration::ValueIterationSolver;
