//! # rl_engine
//!
//! Planning and reinforcement learning over discrete decision processes:
//! value iteration, tabular Q-learning, approximate Q-learning on sparse
//! features, and deep Q-learning with experience replay via the Burn ML
//! framework.
//!
//! ## Modules
//!
//! - [`mdp`]: decision-process contract, tabular builder, grid worlds
//! - [`ai`]: agent trait, algorithms, feature extractors, networks
//! - [`training`]: episode driver, replay buffer, metrics, evaluation
//! - [`checkpoint`]: learner persistence and pruning
//! - [`config`]: TOML configuration loading and validation
//! - [`error`]: structured error types

#![recursion_limit = "256"]

pub mod ai;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod mdp;
pub mod training;
