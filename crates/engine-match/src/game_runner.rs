//! Game execution: drives one game from its start position to a terminal
//! state.
//!
//! This module provides [`GameRunner`], which asks a [`MoveProvider`] for a
//! move each ply, checks it against the [`BoardRules`] and stops at the
//! first terminal state. A game that ends in an engine failure or an
//! illegal move still produces a [`GameRecord`]; only an unusable start
//! position is reported as an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::board::{BoardRules, GameResult};
use crate::error::{FailureKind, MatchError};
use crate::policy::{MoveProvider, MoveSource};
use crate::types::{Move, Position, Side};

/// Default safety cap on the number of plies in a game.
pub const DEFAULT_MAX_PLIES: u32 = 500;

/// Where a game stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum GameState {
    InProgress,
    /// Checkmate, stalemate or a draw by rule.
    TerminalNormal { result: GameResult },
    /// A provider chose a move that is not legal. Nothing is corrected or
    /// retried.
    TerminalIllegalMove { mv: Move, position: Position },
    /// Move selection failed (spawn, protocol, decoding, empty candidates).
    TerminalEngineFailure { kind: FailureKind, message: String },
    /// The ply cap was reached without a decision.
    TerminalMoveLimit,
    /// The stop flag was raised between plies.
    TerminalCancelled,
}

impl GameState {
    /// Maps an error raised during a ply to the state it ends the game in.
    #[must_use]
    pub fn from_error(err: &MatchError) -> Self {
        match err {
            MatchError::IllegalMoveSelected { mv, position } => GameState::TerminalIllegalMove {
                mv: mv.clone(),
                position: position.clone(),
            },
            other => GameState::TerminalEngineFailure {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameState::InProgress)
    }
}

/// A single applied move with its provenance.
///
/// # Example
///
/// ```
/// use engine_match::game_runner::MoveRecord;
/// use engine_match::policy::MoveSource;
/// use engine_match::types::Move;
///
/// let record = MoveRecord {
///     uci: Move::parse("e2e4").unwrap(),
///     source: MoveSource::Engine,
///     score: Some(35),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    /// The move in coordinate notation.
    pub uci: Move,
    /// Whether the book or an engine chose it.
    pub source: MoveSource,
    /// The engine's score for the move, when an engine chose it.
    pub score: Option<i64>,
}

/// A finished game.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    /// Name of the player with the white pieces.
    pub white: String,
    /// Name of the player with the black pieces.
    pub black: String,
    /// When the game started.
    pub started_at: DateTime<Utc>,
    /// The position the game started from.
    pub start: Position,
    /// The position after the last applied move.
    pub final_position: Position,
    /// Applied moves, in order.
    pub moves: Vec<MoveRecord>,
    /// The terminal state.
    pub state: GameState,
}

impl GameRecord {
    /// Returns the game result; anything but a normal ending is unknown.
    #[must_use]
    pub fn result(&self) -> GameResult {
        match &self.state {
            GameState::TerminalNormal { result } => *result,
            _ => GameResult::Unknown,
        }
    }

    /// Returns the failure kind if the game ended abnormally.
    #[must_use]
    pub fn failure(&self) -> Option<FailureKind> {
        match &self.state {
            GameState::TerminalIllegalMove { .. } => Some(FailureKind::IllegalMoveSelected),
            GameState::TerminalEngineFailure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when the game ended in a failure rather than on the board.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }

    /// Returns the applied moves without their provenance.
    #[must_use]
    pub fn move_list(&self) -> Vec<Move> {
        self.moves.iter().map(|m| m.uci.clone()).collect()
    }

    /// Returns the player name for `side`.
    #[must_use]
    pub fn player(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}

/// Executes a single game.
///
/// # Example
///
/// ```ignore
/// let picker = EnginePicker::new(EngineSelector::new("./white", "./black"), QueryOptions::default());
/// let mut runner = GameRunner::new(picker, StandardRules);
/// let record = runner.play_game(&Position::startpos()).await?;
/// println!("Game result: {}", record.result());
/// ```
pub struct GameRunner<P, R> {
    provider: P,
    rules: R,
    max_plies: u32,
    stop: Arc<AtomicBool>,
}

impl<P: MoveProvider, R: BoardRules> GameRunner<P, R> {
    /// Creates a runner with the default ply cap and its own stop flag.
    pub fn new(provider: P, rules: R) -> Self {
        Self {
            provider,
            rules,
            max_plies: DEFAULT_MAX_PLIES,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_max_plies(mut self, max_plies: u32) -> Self {
        self.max_plies = max_plies;
        self
    }

    /// Shares a stop flag; when it is set, the game ends at the next ply.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Returns the move provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Plays a game from `start` until it reaches a terminal state.
    ///
    /// Each ply asks the provider for a move, checks its legality, applies
    /// it and then asks the rules whether the game is over. The start
    /// position itself is checked before the first ply.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Rules`] if `start` is not a valid position.
    /// Every other failure ends the game and is reported in
    /// [`GameRecord::state`].
    pub async fn play_game(&mut self, start: &Position) -> Result<GameRecord, MatchError> {
        let start = self.rules.normalize(start)?;
        let white = self.provider.player_name(Side::White);
        let black = self.provider.player_name(Side::Black);
        let started_at = Utc::now();
        tracing::info!(%white, %black, start = %start, "game started");

        let mut position = start.clone();
        let mut history: Vec<Position> = Vec::new();
        let mut moves: Vec<MoveRecord> = Vec::new();
        let mut state = self.rules_status(&position, &history);

        while !state.is_terminal() {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!(ply = moves.len(), "game cancelled");
                state = GameState::TerminalCancelled;
                break;
            }
            if moves.len() >= self.max_plies as usize {
                tracing::warn!(max_plies = self.max_plies, "move limit reached");
                state = GameState::TerminalMoveLimit;
                break;
            }

            let ply = moves.len() as u32;
            let picked = match self.provider.next_move(&position, ply).await {
                Ok(picked) => picked,
                Err(e) => {
                    tracing::warn!(ply, error = %e, "move selection failed");
                    state = GameState::from_error(&e);
                    break;
                }
            };

            match self.rules.is_legal(&position, &picked.mv) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::error!(ply, mv = %picked.mv, position = %position, "illegal move selected");
                    state = GameState::TerminalIllegalMove {
                        mv: picked.mv,
                        position: position.clone(),
                    };
                    break;
                }
                Err(e) => {
                    state = GameState::from_error(&e);
                    break;
                }
            }

            let next = match self.rules.apply(&position, &picked.mv) {
                Ok(next) => next,
                Err(e) => {
                    state = GameState::from_error(&e);
                    break;
                }
            };

            moves.push(MoveRecord {
                uci: picked.mv,
                source: picked.source,
                score: picked.score,
            });
            history.push(std::mem::replace(&mut position, next));
            state = self.rules_status(&position, &history);
        }

        tracing::info!(plies = moves.len(), state = ?state, "game finished");
        Ok(GameRecord {
            white,
            black,
            started_at,
            start,
            final_position: position,
            moves,
            state,
        })
    }

    fn rules_status(&self, position: &Position, history: &[Position]) -> GameState {
        match self.rules.status(position, history) {
            Ok(Some(result)) => GameState::TerminalNormal { result },
            Ok(None) => GameState::InProgress,
            Err(e) => GameState::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{DrawReason, StandardRules};
    use crate::policy::{BoxFuture, PickedMove};
    use std::collections::VecDeque;

    /// Plays a fixed list of moves, then fails with `NoCandidate`.
    struct Scripted {
        moves: VecDeque<&'static str>,
        asked: Vec<u32>,
        seen: Vec<Position>,
    }

    impl Scripted {
        fn new(moves: &[&'static str]) -> Self {
            Self {
                moves: moves.iter().copied().collect(),
                asked: Vec::new(),
                seen: Vec::new(),
            }
        }
    }

    impl MoveProvider for Scripted {
        fn next_move<'a>(
            &'a mut self,
            position: &'a Position,
            ply: u32,
        ) -> BoxFuture<'a, Result<PickedMove, MatchError>> {
            self.asked.push(ply);
            self.seen.push(position.clone());
            let next = self.moves.pop_front();
            Box::pin(async move {
                let mv = next.ok_or(MatchError::NoCandidate)?;
                Ok::<_, MatchError>(PickedMove {
                    mv: Move::parse(mv).unwrap(),
                    source: MoveSource::Engine,
                    score: Some(0),
                    engine: None,
                })
            })
        }

        fn player_name(&self, side: Side) -> String {
            format!("scripted-{side}")
        }
    }

    #[tokio::test]
    async fn test_fools_mate_ends_normally() {
        let mut runner = GameRunner::new(
            Scripted::new(&["f2f3", "e7e5", "g2g4", "d8h4"]),
            StandardRules,
        );
        let record = runner.play_game(&Position::startpos()).await.unwrap();

        assert_eq!(
            record.state,
            GameState::TerminalNormal {
                result: GameResult::BlackWins
            }
        );
        assert_eq!(record.result(), GameResult::BlackWins);
        assert_eq!(record.moves.len(), 4);
        assert!(!record.is_failed());
        assert_eq!(record.white, "scripted-white");
        assert_eq!(runner.provider().asked, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_replay_reproduces_every_position() {
        // En passant on move 3, a promotion on move 5, castling on both sides.
        let line = [
            "e2e4", "a7a6", "e4e5", "d7d5", "e5d6", "g8f6", "d6c7", "e7e6", "c7b8q", "a8b8",
            "g1f3", "f8c5", "f1c4", "e8g8", "e1g1",
        ];
        let mut runner = GameRunner::new(Scripted::new(&line), StandardRules);
        let record = runner.play_game(&Position::startpos()).await.unwrap();
        assert!(matches!(
            record.state,
            GameState::TerminalEngineFailure {
                kind: FailureKind::NoCandidate,
                ..
            }
        ));
        assert_eq!(record.moves.len(), line.len());

        let replay = StandardRules
            .replay(&record.start, &record.move_list())
            .unwrap();
        let seen = &runner.provider().seen;
        assert_eq!(seen.len(), line.len() + 1);
        assert_eq!(replay.positions.as_slice(), seen.as_slice());
        assert_eq!(replay.positions[line.len()], record.final_position);

        assert_eq!(
            seen[4].as_str(),
            "rnbqkbnr/1pp1pppp/p7/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3"
        );
        assert_eq!(
            seen[9].as_str(),
            "rQbqkb1r/1p3ppp/p3pn2/8/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 5"
        );
        assert_eq!(
            record.final_position.as_str(),
            "1rbq1rk1/1p3ppp/p3pn2/2b5/2B5/5N2/PPPP1PPP/RNBQ1RK1 b - - 5 8"
        );
    }

    #[tokio::test]
    async fn test_illegal_move_stops_game() {
        let mut runner = GameRunner::new(Scripted::new(&["e2e4", "e7e5", "e1e3", "d2d4"]), StandardRules);
        let record = runner.play_game(&Position::startpos()).await.unwrap();

        match &record.state {
            GameState::TerminalIllegalMove { mv, position } => {
                assert_eq!(mv.as_str(), "e1e3");
                assert_eq!(position, &record.final_position);
                assert_eq!(position.side_to_move(), Side::White);
            }
            other => panic!("Expected TerminalIllegalMove, got {other:?}"),
        }
        assert_eq!(record.moves.len(), 2);
        assert_eq!(record.failure(), Some(FailureKind::IllegalMoveSelected));
        assert_eq!(record.result(), GameResult::Unknown);
        assert_eq!(runner.provider().asked, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_provider_failure_is_engine_failure() {
        let mut runner = GameRunner::new(Scripted::new(&[]), StandardRules);
        let record = runner.play_game(&Position::startpos()).await.unwrap();

        assert!(record.moves.is_empty());
        assert_eq!(record.failure(), Some(FailureKind::NoCandidate));
        assert_eq!(record.final_position, record.start);
    }

    #[tokio::test]
    async fn test_move_limit() {
        let mut runner = GameRunner::new(
            Scripted::new(&["g1f3", "g8f6", "f3g1", "f6g8"]),
            StandardRules,
        )
        .with_max_plies(3);
        let record = runner.play_game(&Position::startpos()).await.unwrap();

        assert_eq!(record.state, GameState::TerminalMoveLimit);
        assert_eq!(record.moves.len(), 3);
        assert_eq!(record.result(), GameResult::Unknown);
        assert!(!record.is_failed());
    }

    #[tokio::test]
    async fn test_threefold_repetition_draws() {
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8", "e2e4"];
        let mut runner = GameRunner::new(Scripted::new(&shuffle), StandardRules);
        let record = runner.play_game(&Position::startpos()).await.unwrap();

        assert_eq!(
            record.result(),
            GameResult::Draw(DrawReason::ThreefoldRepetition)
        );
        assert_eq!(record.moves.len(), 8);
    }

    #[tokio::test]
    async fn test_stop_flag_cancels_before_first_ply() {
        let stop = Arc::new(AtomicBool::new(true));
        let mut runner =
            GameRunner::new(Scripted::new(&["e2e4"]), StandardRules).with_stop_flag(stop);
        let record = runner.play_game(&Position::startpos()).await.unwrap();

        assert_eq!(record.state, GameState::TerminalCancelled);
        assert!(runner.provider().asked.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_start_position_plays_no_moves() {
        let mated =
            Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        let mut runner = GameRunner::new(Scripted::new(&["e2e4"]), StandardRules);
        let record = runner.play_game(&mated).await.unwrap();

        assert_eq!(record.result(), GameResult::BlackWins);
        assert!(record.moves.is_empty());
        assert!(runner.provider().asked.is_empty());
    }

    #[tokio::test]
    async fn test_black_to_move_start() {
        let start =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
                .unwrap();
        let mut runner = GameRunner::new(Scripted::new(&["e7e5"]), StandardRules);
        let record = runner.play_game(&start).await.unwrap();

        assert_eq!(record.moves.len(), 1);
        assert_eq!(record.final_position.side_to_move(), Side::White);
    }

    #[tokio::test]
    async fn test_invalid_start_is_error() {
        let empty = Position::from_fen("8/8/8/8/8/8/8/8 w - -").unwrap();
        let mut runner = GameRunner::new(Scripted::new(&[]), StandardRules);
        assert!(matches!(
            runner.play_game(&empty).await,
            Err(MatchError::Rules(_))
        ));
    }

    #[test]
    fn test_game_state_serializes_with_tag() {
        let state = GameState::TerminalNormal {
            result: GameResult::WhiteWins,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "terminal-normal");
        assert_eq!(json["result"], "white-wins");

        let json = serde_json::to_value(GameState::TerminalMoveLimit).unwrap();
        assert_eq!(json["state"], "terminal-move-limit");
    }

    #[test]
    fn test_from_error_maps_illegal_move() {
        let err = MatchError::IllegalMoveSelected {
            mv: Move::parse("e2e5").unwrap(),
            position: Position::startpos(),
        };
        assert!(matches!(
            GameState::from_error(&err),
            GameState::TerminalIllegalMove { .. }
        ));
        let state = GameState::from_error(&MatchError::NoCandidate);
        assert_eq!(
            state,
            GameState::TerminalEngineFailure {
                kind: FailureKind::NoCandidate,
                message: "No candidate moves".to_string(),
            }
        );
    }
}
