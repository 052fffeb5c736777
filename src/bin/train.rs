#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use rl_engine::ai::algorithms::{ApproximateState, DqnTrainingState, QLearningState};
use rl_engine::ai::{
    Agent, ApproximateQAgent, CoordinateExtractor, DqnAgent, GridEncoder, MlpApproximator,
    QLearningAgent, StateEncoder, ValueIterationSolver,
};
use rl_engine::checkpoint::{
    CheckpointData, CheckpointManager, CheckpointManagerConfig, CheckpointMetrics,
    CheckpointRequest,
};
use rl_engine::config::AppConfig;
use rl_engine::mdp::{DecisionProcess, GridAction, GridState, Gridworld, MdpEnvironment};
use rl_engine::training::{compare_policies, evaluate, Trainer, TrainingMetrics, TrainingReport};

const EVAL_EPISODES: usize = 20;
const ONLINE_WEIGHTS: &str = "online";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    ValueIteration,
    QLearning,
    Approximate,
    Dqn,
}

impl Algorithm {
    fn dir_name(self) -> &'static str {
        match self {
            Algorithm::ValueIteration => "value_iteration",
            Algorithm::QLearning => "q_learning",
            Algorithm::Approximate => "approximate",
            Algorithm::Dqn => "dqn",
        }
    }
}

/// Solve or train on a grid world and print the resulting values and policy.
#[derive(Parser)]
#[command(name = "train", about = "Run an RL algorithm on a grid world")]
struct Cli {
    #[arg(long, value_enum, default_value = "q-learning")]
    algorithm: Algorithm,

    /// Grid layout: book, bridge, cliff, maze or discount
    #[arg(long)]
    grid: Option<String>,

    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override number of training episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Override value iteration sweeps
    #[arg(long)]
    iterations: Option<usize>,

    /// Seed every random source
    #[arg(long)]
    seed: Option<u64>,

    /// Save a checkpoint after training
    #[arg(long)]
    save: bool,

    /// Resume from the latest checkpoint of this algorithm
    #[arg(long)]
    resume: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    if cli.print_config {
        print!("{}", AppConfig::default_toml()?);
        return Ok(());
    }

    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Apply CLI overrides
    if let Some(grid) = &cli.grid {
        app_config.gridworld.name = grid.clone();
    }
    if let Some(episodes) = cli.episodes {
        app_config.training.num_episodes = episodes;
    }
    if let Some(iterations) = cli.iterations {
        app_config.solver.iterations = iterations;
    }
    if let Some(seed) = cli.seed {
        app_config.q_learning.seed = Some(seed);
        app_config.approximate.seed = Some(seed);
        app_config.dqn.seed = Some(seed);
    }
    app_config.validate().context("validating configuration")?;

    let grid = app_config.gridworld.build()?;
    let solver = ValueIterationSolver::solve(&grid, app_config.solver.iterations)?;

    let session = Session {
        cli: &cli,
        config: &app_config,
        grid: &grid,
        solver: &solver,
    };

    match cli.algorithm {
        Algorithm::ValueIteration => {
            println!(
                "Value iteration on '{}' ({} sweeps)",
                app_config.gridworld.name,
                solver.sweeps()
            );
            print_values(&grid, |s| solver.get_value(s));
            print_policy(&grid, |s| solver.get_policy(s));
            Ok(())
        }
        Algorithm::QLearning => {
            let model = grid.clone();
            let mut agent = QLearningAgent::new(app_config.q_learning, move |s: &GridState| {
                model.actions(s)
            })?;
            if let Some(data) = session.resume()? {
                agent.restore(data.state::<QLearningState<GridState, GridAction>>()?);
            }
            let report = session.run(&mut agent)?;
            if cli.save {
                session.save(&report, &agent, &agent.snapshot(), |_| Ok(()))?;
            }
            Ok(())
        }
        Algorithm::Approximate => {
            let model = grid.clone();
            let mut agent = ApproximateQAgent::new(
                app_config.approximate,
                CoordinateExtractor::for_grid(&grid),
                move |s: &GridState| model.actions(s),
            )?;
            if let Some(data) = session.resume()? {
                agent.restore(data.state::<ApproximateState>()?);
            }
            let report = session.run(&mut agent)?;
            for (feature, weight) in sorted_weights(&agent) {
                println!("  w[{feature}] = {weight:.4}");
            }
            if cli.save {
                session.save(&report, &agent, &agent.snapshot(), |_| Ok(()))?;
            }
            Ok(())
        }
        Algorithm::Dqn => {
            let encoder = GridEncoder::for_grid(&grid);
            let actions = GridAction::ALL.to_vec();
            let online = MlpApproximator::new(encoder.dim(), actions.len(), &app_config.network);
            let target = MlpApproximator::new(encoder.dim(), actions.len(), &app_config.network);
            let model = grid.clone();
            let mut agent = DqnAgent::new(
                app_config.dqn.clone(),
                online,
                target,
                encoder,
                actions,
                move |s: &GridState| model.actions(s),
            )?;
            if let Some(data) = session.resume()? {
                agent.restore_training_state(data.state::<DqnTrainingState>()?)?;
                agent.online_mut().load_file(&data.path, ONLINE_WEIGHTS)?;
                agent.sync_target();
            }
            let report = session.run(&mut agent)?;
            if cli.save {
                let training_state = agent.training_state();
                let online = agent.online();
                session.save(&report, &agent, &training_state, |dir| {
                    online.save_file(dir, ONLINE_WEIGHTS)
                })?;
            }
            Ok(())
        }
    }
}

/// Everything an online run needs besides the agent.
struct Session<'a> {
    cli: &'a Cli,
    config: &'a AppConfig,
    grid: &'a Gridworld,
    solver: &'a ValueIterationSolver<'a, Gridworld>,
}

impl Session<'_> {
    fn environment(&self) -> MdpEnvironment<Gridworld> {
        let start = self.grid.start_state();
        match self.cli.seed {
            Some(seed) => MdpEnvironment::with_seed(self.grid.clone(), start, seed),
            None => MdpEnvironment::new(self.grid.clone(), start),
        }
    }

    fn checkpoint_manager(&self) -> Result<CheckpointManager> {
        let config = CheckpointManagerConfig {
            checkpoint_dir: self
                .config
                .checkpoint
                .checkpoint_dir
                .join(self.cli.algorithm.dir_name()),
            ..self.config.checkpoint.clone()
        };
        Ok(CheckpointManager::new(config)?)
    }

    fn resume(&self) -> Result<Option<CheckpointData>> {
        if !self.cli.resume {
            return Ok(None);
        }
        match self.checkpoint_manager()?.load_latest() {
            Ok(data) => {
                println!("Resumed from episode {}", data.metadata.episode);
                Ok(Some(data))
            }
            Err(e) => {
                println!("No checkpoint found ({e}), starting fresh");
                Ok(None)
            }
        }
    }

    /// Train, evaluate greedily, and report against the solved values.
    fn run<G>(&self, agent: &mut G) -> Result<TrainingReport>
    where
        G: Agent<GridState, GridAction>,
    {
        let mut env = self.environment();
        let trainer = Trainer::new(self.config.training.clone())?;
        let report = trainer.train(agent, &mut env)?;

        let max_steps = self.config.training.max_steps_per_episode;
        let greedy_return = evaluate(agent, &mut env, EVAL_EPISODES, max_steps)?;
        let comparison = compare_policies(self.solver, &*agent);

        println!(
            "{} on '{}': {} episodes, {} steps",
            agent.name(),
            self.config.gridworld.name,
            report.episodes.len(),
            report.total_steps
        );
        for point in &report.history {
            println!(
                "  episode {:>6}  return {:>8.3}  steps {:>4}  epsilon {:.3}",
                point.episode, point.total_return, point.steps, point.epsilon
            );
        }
        println!("Greedy return over {EVAL_EPISODES} episodes: {greedy_return:.3}");
        println!(
            "Policy agreement with value iteration: {:.1}% of {} states, max value gap {:.3}",
            comparison.agreement() * 100.0,
            comparison.states_compared,
            comparison.max_value_gap
        );
        print_values(self.grid, |s| agent.get_value(s));
        print_policy(self.grid, |s| agent.get_policy(s));
        Ok(report)
    }

    fn save<G, T, F>(
        &self,
        report: &TrainingReport,
        agent: &G,
        state: &T,
        write_extra: F,
    ) -> Result<()>
    where
        G: Agent<GridState, GridAction>,
        T: serde::Serialize,
        F: FnOnce(&std::path::Path) -> Result<(), rl_engine::error::CheckpointError>,
    {
        let manager = self.checkpoint_manager()?;
        let episode = self.config.training.num_episodes;
        let request = CheckpointRequest {
            algorithm: agent.name(),
            episode,
            metrics: checkpoint_metrics(report),
            hyperparameters: serde_json::to_value(self.config)?,
            state,
        };
        let path = manager.save_with(request, write_extra)?;
        println!("Saved checkpoint to {}", path.display());
        Ok(())
    }
}

fn checkpoint_metrics(report: &TrainingReport) -> CheckpointMetrics {
    let window = report.episodes.len();
    let mut metrics = TrainingMetrics::with_capacity(window);
    for result in &report.episodes {
        metrics.record_episode(*result);
    }
    CheckpointMetrics {
        average_return: metrics.average_return(window),
        average_steps: metrics.average_steps(window),
        terminal_rate: metrics.terminal_rate(window),
        current_loss: report.average_loss,
        training_steps: report.total_steps,
    }
}

fn sorted_weights(agent: &ApproximateQAgent<GridState, GridAction>) -> Vec<(String, f64)> {
    let mut weights: Vec<(String, f64)> =
        agent.weights().iter().map(|(k, v)| (k.clone(), *v)).collect();
    weights.sort_by(|a, b| a.0.cmp(&b.0));
    weights
}

/// Print one value per cell, top row first.
fn print_values(grid: &Gridworld, value: impl Fn(&GridState) -> f64) {
    println!("Values:");
    for y in (0..grid.height()).rev() {
        let row: Vec<String> = (0..grid.width())
            .map(|x| {
                if grid.is_wall(x, y) {
                    format!("{:>8}", "#####")
                } else {
                    format!("{:>8.3}", value(&GridState::Cell(x, y)))
                }
            })
            .collect();
        println!("  {}", row.join(" "));
    }
}

fn print_policy(grid: &Gridworld, policy: impl Fn(&GridState) -> Option<GridAction>) {
    println!("Policy:");
    for y in (0..grid.height()).rev() {
        let row: Vec<String> = (0..grid.width())
            .map(|x| {
                let label = if grid.is_wall(x, y) {
                    "#"
                } else {
                    policy(&GridState::Cell(x, y)).map_or("-", GridAction::name)
                };
                format!("{label:>6}")
            })
            .collect();
        println!("  {}", row.join(" "));
    }
}
