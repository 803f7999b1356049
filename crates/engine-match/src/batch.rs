//! Runs a batch of independent games and tallies the results.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::board::{GameResult, StandardRules};
use crate::config::{ConfigError, MatchConfig};
use crate::error::FailureKind;
use crate::game_runner::{GameRecord, GameRunner, GameState};
use crate::policy::{BookProvider, EnginePicker, MoveProvider};
use crate::types::{Position, Side};

/// The outcome of one game in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    /// Zero-based index of the game in the batch.
    pub index: u32,
    /// Unique id, also used in output file names.
    pub id: Uuid,
    pub white: String,
    pub black: String,
    /// The finished game. Absent only when the game could not start.
    pub record: Option<GameRecord>,
    /// Why the game failed, if it did.
    pub failure: Option<FailureKind>,
    /// Error message for a game that could not start.
    pub error: Option<String>,
}

impl GameReport {
    /// Returns the game result, unknown when there is no record.
    #[must_use]
    pub fn result(&self) -> GameResult {
        self.record
            .as_ref()
            .map_or(GameResult::Unknown, GameRecord::result)
    }

    /// True when the game was stopped by the stop flag.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.record.as_ref().map(|r| &r.state),
            Some(GameState::TerminalCancelled)
        )
    }
}

/// Wins, draws and losses of one engine across the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineTally {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

/// Aggregated results of a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<GameReport>,
    pub white_wins: u32,
    pub black_wins: u32,
    pub draws: u32,
    /// Games that ended without a decision and without a failure, e.g. at
    /// the move limit.
    pub unknown: u32,
    pub failed: u32,
    pub cancelled: u32,
    /// Tallies keyed by engine name. Self-play games are not tallied.
    pub engines: BTreeMap<String, EngineTally>,
}

impl BatchSummary {
    /// Returns the number of games played or attempted.
    #[must_use]
    pub fn games(&self) -> usize {
        self.reports.len()
    }

    /// Counts failed games by failure kind.
    #[must_use]
    pub fn failures_by_kind(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for kind in self.reports.iter().filter_map(|r| r.failure) {
            *counts.entry(kind.to_string()).or_insert(0) += 1;
        }
        counts
    }

    fn add(&mut self, report: GameReport) {
        let result = report.result();
        if report.failure.is_some() {
            self.failed += 1;
        } else if report.is_cancelled() {
            self.cancelled += 1;
        } else {
            match result {
                GameResult::WhiteWins => self.white_wins += 1,
                GameResult::BlackWins => self.black_wins += 1,
                GameResult::Draw(_) => self.draws += 1,
                GameResult::Unknown => self.unknown += 1,
            }
        }

        if result != GameResult::Unknown && report.white != report.black {
            for side in [Side::White, Side::Black] {
                let name = match side {
                    Side::White => &report.white,
                    Side::Black => &report.black,
                };
                let tally = self.engines.entry(name.clone()).or_default();
                match result.winner() {
                    Some(winner) if winner == side => tally.wins += 1,
                    Some(_) => tally.losses += 1,
                    None => tally.draws += 1,
                }
            }
        }

        self.reports.push(report);
    }
}

/// Runs the configured number of games one after another.
///
/// Games share nothing mutable; a failure in one game is recorded in its
/// report and the batch moves on to the next game.
pub struct BatchRunner {
    config: MatchConfig,
    start: Position,
    book: Arc<dyn BookProvider>,
    stop: Arc<AtomicBool>,
}

impl BatchRunner {
    /// Creates a runner after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration cannot be used.
    pub fn new(config: MatchConfig, book: Arc<dyn BookProvider>) -> Result<Self, ConfigError> {
        config.validate()?;
        let start = config.start_position()?;
        Ok(Self {
            config,
            start,
            book,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shares a stop flag. Once set, the current game ends at its next ply
    /// and no further game starts.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// True if game `index` is played with the engines' colors swapped.
    #[must_use]
    pub fn is_swapped(&self, index: u32) -> bool {
        self.config.alternate_colors && index % 2 == 1
    }

    /// Runs the batch with engine-backed players.
    pub async fn run(&self) -> BatchSummary {
        self.run_with(|_, swapped| {
            EnginePicker::new(self.config.selector(swapped), self.config.query_options())
                .with_book(Arc::clone(&self.book), self.config.opening_book_depth)
                .with_convention(self.config.score_convention)
        })
        .await
    }

    /// Runs the batch with players built by `factory`, which receives the
    /// game index and whether colors are swapped.
    pub async fn run_with<P, F>(&self, mut factory: F) -> BatchSummary
    where
        P: MoveProvider,
        F: FnMut(u32, bool) -> P,
    {
        let mut summary = BatchSummary::default();

        for index in 0..self.config.game_count {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!(played = index, "batch cancelled");
                break;
            }

            let provider = factory(index, self.is_swapped(index));
            let white = provider.player_name(Side::White);
            let black = provider.player_name(Side::Black);
            let id = Uuid::new_v4();
            tracing::info!(game = index + 1, total = self.config.game_count, %id, %white, %black, "starting game");

            let mut runner = GameRunner::new(provider, StandardRules)
                .with_max_plies(self.config.max_plies)
                .with_stop_flag(Arc::clone(&self.stop));

            let report = match runner.play_game(&self.start).await {
                Ok(record) => {
                    if let Some(kind) = record.failure() {
                        tracing::warn!(game = index + 1, failure = %kind, "game failed");
                    } else {
                        tracing::info!(game = index + 1, result = %record.result(), plies = record.moves.len(), "game finished");
                    }
                    GameReport {
                        index,
                        id,
                        white,
                        black,
                        failure: record.failure(),
                        record: Some(record),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(game = index + 1, error = %e, "game could not start");
                    GameReport {
                        index,
                        id,
                        white,
                        black,
                        record: None,
                        failure: Some(e.kind()),
                        error: Some(e.to_string()),
                    }
                }
            };
            summary.add(report);
        }

        summary
    }
}
