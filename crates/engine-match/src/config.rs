//! Configuration file loading for match batches.
//!
//! This module provides [`MatchConfig`], read from a TOML file. Every key is
//! optional; a missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine_session::QueryOptions;
use crate::game_runner::DEFAULT_MAX_PLIES;
use crate::policy::{EndgameEngine, EngineSelector, ScoreConvention};
use crate::types::Position;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range or cannot be used.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for a batch of games.
///
/// # Example
///
/// ```
/// use engine_match::config::MatchConfig;
///
/// let config: MatchConfig = toml::from_str(r#"
/// engine_white_path = "./stockfish"
/// game_count = 2
/// "#).unwrap();
/// assert_eq!(config.game_count, 2);
/// assert_eq!(config.opening_book_depth, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatchConfig {
    /// Engine playing White (Black when colors are swapped).
    #[serde(default = "default_engine_path")]
    pub engine_white_path: PathBuf,
    /// Engine playing Black (White when colors are swapped).
    #[serde(default = "default_engine_path")]
    pub engine_black_path: PathBuf,
    /// Number of plies during which the opening book is consulted.
    #[serde(default = "default_book_depth")]
    pub opening_book_depth: u32,
    /// Per-move time limit in milliseconds. No limit when absent.
    #[serde(default)]
    pub movetime_ms: Option<u64>,
    /// Skill level passed to engines through the environment.
    #[serde(default)]
    pub skill_level: Option<u32>,
    /// Number of games in the batch.
    #[serde(default = "default_game_count")]
    pub game_count: u32,
    /// Safety cap on plies per game.
    #[serde(default = "default_max_plies")]
    pub max_plies: u32,
    /// Swap the engines' colors every other game.
    #[serde(default)]
    pub alternate_colors: bool,
    /// Orientation of engine scores.
    #[serde(default)]
    pub score_convention: ScoreConvention,
    /// Start position for every game. Standard start when absent.
    #[serde(default)]
    pub start_fen: Option<String>,
    /// JSON opening book. The built-in book is used when absent.
    #[serde(default)]
    pub book_path: Option<PathBuf>,
    /// Seed for book move choice.
    #[serde(default)]
    pub book_seed: Option<u64>,
    /// Where PGN files and the batch summary are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Engine that takes over in positions with few pieces.
    #[serde(default)]
    pub endgame: Option<EndgameEngine>,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("./engine")
}

fn default_book_depth() -> u32 {
    4
}

fn default_game_count() -> u32 {
    10
}

fn default_max_plies() -> u32 {
    DEFAULT_MAX_PLIES
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            engine_white_path: default_engine_path(),
            engine_black_path: default_engine_path(),
            opening_book_depth: default_book_depth(),
            movetime_ms: None,
            skill_level: None,
            game_count: default_game_count(),
            max_plies: default_max_plies(),
            alternate_colors: false,
            score_convention: ScoreConvention::default(),
            start_fen: None,
            book_path: None,
            book_seed: None,
            output_dir: default_output_dir(),
            endgame: None,
        }
    }
}

impl MatchConfig {
    /// Loads the configuration from [`Self::config_path()`].
    ///
    /// # Errors
    ///
    /// See [`Self::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Loads the configuration from `path`, falling back to the defaults if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Returns the path to the default configuration file, `match.toml` in
    /// the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("match.toml")
    }

    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero game count, a zero ply
    /// cap, a zero move time or a start position that does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_count == 0 {
            return Err(ConfigError::Invalid("game_count must be at least 1".into()));
        }
        if self.max_plies == 0 {
            return Err(ConfigError::Invalid("max_plies must be at least 1".into()));
        }
        if self.movetime_ms == Some(0) {
            return Err(ConfigError::Invalid("movetime_ms must be positive".into()));
        }
        self.start_position()?;
        Ok(())
    }

    /// Returns the configured start position.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `start_fen` is malformed.
    pub fn start_position(&self) -> Result<Position, ConfigError> {
        match &self.start_fen {
            Some(fen) => {
                Position::from_fen(fen).map_err(|e| ConfigError::Invalid(e.to_string()))
            }
            None => Ok(Position::startpos()),
        }
    }

    /// Returns the per-move time limit.
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.movetime_ms.map(Duration::from_millis)
    }

    /// Returns the options for each engine query.
    #[must_use]
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            time_limit: self.time_limit(),
            skill_level: self.skill_level,
        }
    }

    /// Returns the engine selector for a game, with colors optionally
    /// swapped.
    #[must_use]
    pub fn selector(&self, swapped: bool) -> EngineSelector {
        let (white, black) = if swapped {
            (&self.engine_black_path, &self.engine_white_path)
        } else {
            (&self.engine_white_path, &self.engine_black_path)
        };
        EngineSelector::new(white, black).with_endgame(self.endgame.clone())
    }
}
