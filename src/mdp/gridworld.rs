use std::fmt;

use serde::{Deserialize, Serialize};

use super::DecisionProcess;
use crate::error::{ConfigError, StateError};

/// Names accepted by [`Gridworld::named`].
pub const GRID_NAMES: [&str; 5] = ["book", "bridge", "cliff", "maze", "discount"];

const BOOK_GRID: &[&[&str]] = &[
    &["_", "_", "_", "+1"],
    &["_", "#", "_", "-1"],
    &["S", "_", "_", "_"],
];

const BRIDGE_GRID: &[&[&str]] = &[
    &["#", "-100", "-100", "-100", "-100", "-100", "#"],
    &["1", "S", "_", "_", "_", "_", "10"],
    &["#", "-100", "-100", "-100", "-100", "-100", "#"],
];

const CLIFF_GRID: &[&[&str]] = &[
    &["_", "_", "_", "_", "_"],
    &["S", "_", "_", "_", "10"],
    &["-100", "-100", "-100", "-100", "-100"],
];

const MAZE_GRID: &[&[&str]] = &[
    &["_", "_", "_", "+1"],
    &["#", "#", "_", "#"],
    &["_", "#", "_", "_"],
    &["_", "#", "#", "_"],
    &["S", "_", "_", "_"],
];

const DISCOUNT_GRID: &[&[&str]] = &[
    &["_", "_", "_", "_", "_"],
    &["_", "#", "_", "_", "_"],
    &["_", "#", "1", "#", "10"],
    &["S", "_", "_", "_", "_"],
    &["-10", "-10", "-10", "-10", "-10"],
];

/// A grid position, or the single absorbing state reached after exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GridState {
    Cell(usize, usize),
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridAction {
    North,
    West,
    South,
    East,
    Exit,
}

impl GridAction {
    pub const MOVES: [GridAction; 4] = [
        GridAction::North,
        GridAction::West,
        GridAction::South,
        GridAction::East,
    ];

    pub const ALL: [GridAction; 5] = [
        GridAction::North,
        GridAction::West,
        GridAction::South,
        GridAction::East,
        GridAction::Exit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GridAction::North => "north",
            GridAction::West => "west",
            GridAction::South => "south",
            GridAction::East => "east",
            GridAction::Exit => "exit",
        }
    }

    /// The two directions an intended move can slip into.
    fn perpendicular(self) -> [GridAction; 2] {
        match self {
            GridAction::North | GridAction::South => [GridAction::West, GridAction::East],
            GridAction::West | GridAction::East => [GridAction::North, GridAction::South],
            GridAction::Exit => [GridAction::Exit, GridAction::Exit],
        }
    }
}

impl fmt::Display for GridAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tile {
    Wall,
    Open,
    Exit(f64),
}

/// Grid world with noisy movement.
///
/// Coordinates are `(x, y)` with `y = 0` on the bottom row. Numbered cells are
/// exits: their only action is `Exit`, which pays the cell's value and moves to
/// [`GridState::Terminal`]. Moves succeed with probability `1 - noise` and slip
/// to either perpendicular direction with `noise / 2`; bumping into a wall or
/// the border leaves the agent in place.
#[derive(Debug, Clone)]
pub struct Gridworld {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    start: GridState,
    noise: f64,
    living_reward: f64,
    discount: f64,
}

impl Gridworld {
    /// Parse a grid from rows listed top to bottom.
    ///
    /// Tokens: `#` wall, `S` start, `_` or blank open, anything else must parse
    /// as a number and becomes an exit cell.
    pub fn from_rows(rows: &[&[&str]]) -> Result<Self, ConfigError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(ConfigError::Validation("grid must not be empty".into()));
        }

        let mut tiles = vec![Tile::Open; width * height];
        let mut start = None;
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(ConfigError::Validation(format!(
                    "grid row {row_idx} has {} cells, expected {width}",
                    row.len()
                )));
            }
            let y = height - 1 - row_idx;
            for (x, token) in row.iter().enumerate() {
                let tile = match token.trim() {
                    "#" => Tile::Wall,
                    "" | "_" => Tile::Open,
                    "S" => {
                        start = Some(GridState::Cell(x, y));
                        Tile::Open
                    }
                    other => other.parse::<f64>().map(Tile::Exit).map_err(|_| {
                        ConfigError::Validation(format!("invalid grid cell '{other}'"))
                    })?,
                };
                tiles[y * width + x] = tile;
            }
        }

        let start = start.ok_or_else(|| ConfigError::Validation("grid has no start cell".into()))?;

        Ok(Gridworld {
            width,
            height,
            tiles,
            start,
            noise: 0.2,
            living_reward: 0.0,
            discount: 0.9,
        })
    }

    /// Look up one of the built-in layouts (`"book"`, `"BookGrid"`, ...).
    pub fn named(name: &str) -> Result<Self, ConfigError> {
        let key = name.to_ascii_lowercase();
        let key = key.strip_suffix("grid").unwrap_or(&key);
        let rows = match key {
            "book" => BOOK_GRID,
            "bridge" => BRIDGE_GRID,
            "cliff" => CLIFF_GRID,
            "maze" => MAZE_GRID,
            "discount" => DISCOUNT_GRID,
            _ => {
                return Err(ConfigError::Validation(format!(
                    "unknown grid '{name}' (expected one of {GRID_NAMES:?})"
                )))
            }
        };
        Self::from_rows(rows)
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_living_reward(mut self, living_reward: f64) -> Self {
        self.living_reward = living_reward;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn set_noise(&mut self, noise: f64) {
        self.noise = noise;
    }

    pub fn set_living_reward(&mut self, living_reward: f64) {
        self.living_reward = living_reward;
    }

    pub fn set_discount(&mut self, discount: f64) {
        self.discount = discount;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn living_reward(&self) -> f64 {
        self.living_reward
    }

    pub fn start_state(&self) -> GridState {
        self.start
    }

    pub fn is_wall(&self, x: usize, y: usize) -> bool {
        matches!(self.tile(x, y), Some(Tile::Wall))
    }

    /// Reward paid for exiting from `(x, y)`, if it is an exit cell.
    pub fn exit_reward(&self, x: usize, y: usize) -> Option<f64> {
        match self.tile(x, y) {
            Some(Tile::Exit(r)) => Some(r),
            _ => None,
        }
    }

    fn tile(&self, x: usize, y: usize) -> Option<Tile> {
        if x < self.width && y < self.height {
            Some(self.tiles[y * self.width + x])
        } else {
            None
        }
    }

    /// Where a move in `direction` lands, staying put when blocked.
    fn step(&self, x: usize, y: usize, direction: GridAction) -> GridState {
        let target = match direction {
            GridAction::North => Some((x, y + 1)),
            GridAction::South => y.checked_sub(1).map(|ny| (x, ny)),
            GridAction::East => Some((x + 1, y)),
            GridAction::West => x.checked_sub(1).map(|nx| (nx, y)),
            GridAction::Exit => None,
        };
        match target {
            Some((nx, ny)) if matches!(self.tile(nx, ny), Some(t) if t != Tile::Wall) => {
                GridState::Cell(nx, ny)
            }
            _ => GridState::Cell(x, y),
        }
    }
}

impl DecisionProcess for Gridworld {
    type State = GridState;
    type Action = GridAction;

    fn states(&self) -> Vec<GridState> {
        let mut states = vec![GridState::Terminal];
        for x in 0..self.width {
            for y in 0..self.height {
                if !self.is_wall(x, y) {
                    states.push(GridState::Cell(x, y));
                }
            }
        }
        states
    }

    fn actions(&self, state: &GridState) -> Vec<GridAction> {
        match *state {
            GridState::Terminal => Vec::new(),
            GridState::Cell(x, y) => match self.tile(x, y) {
                Some(Tile::Exit(_)) => vec![GridAction::Exit],
                Some(Tile::Open) => GridAction::MOVES.to_vec(),
                Some(Tile::Wall) | None => Vec::new(),
            },
        }
    }

    fn transitions(
        &self,
        state: &GridState,
        action: &GridAction,
    ) -> Result<Vec<(GridState, f64)>, StateError> {
        let (x, y) = match *state {
            GridState::Terminal => return Err(StateError::terminal(state)),
            GridState::Cell(x, y) => (x, y),
        };

        if self.exit_reward(x, y).is_some() {
            return Ok(vec![(GridState::Terminal, 1.0)]);
        }
        if *action == GridAction::Exit {
            return Ok(vec![(*state, 1.0)]);
        }

        let [left, right] = action.perpendicular();
        let candidates = [
            (self.step(x, y, *action), 1.0 - self.noise),
            (self.step(x, y, left), self.noise / 2.0),
            (self.step(x, y, right), self.noise / 2.0),
        ];

        let mut merged: Vec<(GridState, f64)> = Vec::with_capacity(3);
        for (next, p) in candidates {
            if p == 0.0 {
                continue;
            }
            match merged.iter_mut().find(|(s, _)| *s == next) {
                Some(entry) => entry.1 += p,
                None => merged.push((next, p)),
            }
        }
        Ok(merged)
    }

    fn reward(
        &self,
        state: &GridState,
        _action: &GridAction,
        _next_state: &GridState,
    ) -> Result<f64, StateError> {
        match *state {
            GridState::Terminal => Err(StateError::terminal(state)),
            GridState::Cell(x, y) => Ok(self.exit_reward(x, y).unwrap_or(self.living_reward)),
        }
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn is_terminal(&self, state: &GridState) -> bool {
        *state == GridState::Terminal
    }
}
