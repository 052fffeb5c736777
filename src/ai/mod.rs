mod agent;
pub mod algorithms;
mod approximator;
pub mod exploration;
pub mod features;
pub mod networks;
mod q_table;
pub mod state_encoding;

pub use agent::{Agent, LearnerParams, UpdateMetrics};
pub use algorithms::{
    ApproximateQAgent, DqnAgent, DqnConfig, QLearningAgent, TargetSync, ValueIterationSolver,
};
pub use approximator::{FitSample, FunctionApproximator};
pub use features::{CoordinateExtractor, FeatureExtractor, FeatureVector, IdentityExtractor};
pub use networks::{MlpApproximator, MlpSettings};
pub use q_table::{QEntry, QTable};
pub use state_encoding::{GridEncoder, OneHotEncoder, StateEncoder};
