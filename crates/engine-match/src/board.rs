//! Board rules: legality, move application and game termination.
//!
//! The orchestrator never looks inside a position itself. Everything that
//! needs chess knowledge goes through [`BoardRules`]; [`StandardRules`]
//! implements it for standard chess on top of `shakmaty`.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position as _};
use std::fmt;

use crate::error::MatchError;
use crate::types::{Move, Position, Side};

/// Why a game was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawReason {
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DrawReason::Stalemate => "stalemate",
            DrawReason::InsufficientMaterial => "insufficient material",
            DrawReason::FiftyMoveRule => "fifty-move rule",
            DrawReason::ThreefoldRepetition => "threefold repetition",
        };
        f.write_str(text)
    }
}

/// Outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw(DrawReason),
    /// The game stopped without a decision (failure, move limit, cancel).
    Unknown,
}

impl GameResult {
    /// The win for `side`.
    #[must_use]
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => GameResult::WhiteWins,
            Side::Black => GameResult::BlackWins,
        }
    }

    /// Returns the PGN result token.
    #[must_use]
    pub fn pgn_token(&self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw(_) => "1/2-1/2",
            GameResult::Unknown => "*",
        }
    }

    /// Returns the winning side, if any.
    #[must_use]
    pub fn winner(&self) -> Option<Side> {
        match self {
            GameResult::WhiteWins => Some(Side::White),
            GameResult::BlackWins => Some(Side::Black),
            _ => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::WhiteWins => write!(f, "white wins"),
            GameResult::BlackWins => write!(f, "black wins"),
            GameResult::Draw(reason) => write!(f, "draw ({reason})"),
            GameResult::Unknown => write!(f, "unknown"),
        }
    }
}

/// The positions and SAN transcript produced by replaying a move list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// Every position visited, starting with the start position. Always one
    /// longer than the move list.
    pub positions: Vec<Position>,
    /// Standard algebraic notation for each move, check marks included.
    pub san: Vec<String>,
}

impl Replay {
    /// The position reached after the last move.
    #[must_use]
    pub fn final_position(&self) -> Option<&Position> {
        self.positions.last()
    }
}

/// Chess knowledge needed to drive a game.
pub trait BoardRules: Send + Sync {
    /// Validates a position and returns its canonical form.
    fn normalize(&self, position: &Position) -> Result<Position, MatchError>;

    /// Returns every legal move in `position`.
    fn legal_moves(&self, position: &Position) -> Result<Vec<Move>, MatchError>;

    /// Returns true if `mv` may be played in `position`.
    fn is_legal(&self, position: &Position, mv: &Move) -> Result<bool, MatchError> {
        Ok(self.legal_moves(position)?.contains(mv))
    }

    /// Plays `mv` and returns the resulting position.
    ///
    /// # Errors
    ///
    /// [`MatchError::IllegalMoveSelected`] if the move is not legal.
    fn apply(&self, position: &Position, mv: &Move) -> Result<Position, MatchError>;

    /// Decides whether `position` ends the game.
    ///
    /// `history` holds the positions that preceded it in this game, oldest
    /// first, and is used for repetition.
    fn status(
        &self,
        position: &Position,
        history: &[Position],
    ) -> Result<Option<GameResult>, MatchError>;

    /// Replays `moves` from `start`.
    fn replay(&self, start: &Position, moves: &[Move]) -> Result<Replay, MatchError>;
}

/// Standard chess rules backed by `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    fn parse(position: &Position) -> Result<Chess, MatchError> {
        let fen: Fen = position
            .as_str()
            .parse()
            .map_err(|e| MatchError::Rules(format!("{position}: {e}")))?;
        fen.into_position(CastlingMode::Standard)
            .map_err(|e| MatchError::Rules(format!("{position}: {e}")))
    }

    fn encode(pos: &Chess) -> Result<Position, MatchError> {
        let fen = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();
        Position::from_fen(&fen).map_err(|e| MatchError::Rules(e.to_string()))
    }

    fn find_move(pos: &Chess, mv: &Move) -> Option<shakmaty::Move> {
        pos.legal_moves()
            .into_iter()
            .find(|m| m.to_uci(CastlingMode::Standard).to_string() == mv.as_str())
    }
}

impl BoardRules for StandardRules {
    fn normalize(&self, position: &Position) -> Result<Position, MatchError> {
        Self::encode(&Self::parse(position)?)
    }

    fn legal_moves(&self, position: &Position) -> Result<Vec<Move>, MatchError> {
        let pos = Self::parse(position)?;
        pos.legal_moves()
            .iter()
            .map(|m| {
                Move::parse(&m.to_uci(CastlingMode::Standard).to_string())
                    .map_err(|e| MatchError::Rules(e.to_string()))
            })
            .collect()
    }

    fn is_legal(&self, position: &Position, mv: &Move) -> Result<bool, MatchError> {
        let pos = Self::parse(position)?;
        Ok(Self::find_move(&pos, mv).is_some())
    }

    fn apply(&self, position: &Position, mv: &Move) -> Result<Position, MatchError> {
        let mut pos = Self::parse(position)?;
        let legal = Self::find_move(&pos, mv).ok_or_else(|| MatchError::IllegalMoveSelected {
            mv: mv.clone(),
            position: position.clone(),
        })?;
        pos.play_unchecked(&legal);
        Self::encode(&pos)
    }

    /// Draws that a player could claim end the game at once: the fifty-move
    /// rule at 100 halfmoves and threefold repetition. Games between engines
    /// never wait for the 75-move rule or fivefold repetition.
    fn status(
        &self,
        position: &Position,
        history: &[Position],
    ) -> Result<Option<GameResult>, MatchError> {
        let pos = Self::parse(position)?;

        if pos.is_checkmate() {
            let loser = match pos.turn() {
                Color::White => Side::White,
                Color::Black => Side::Black,
            };
            return Ok(Some(GameResult::win_for(loser.opposite())));
        }
        if pos.is_stalemate() {
            return Ok(Some(GameResult::Draw(DrawReason::Stalemate)));
        }
        if pos.is_insufficient_material() {
            return Ok(Some(GameResult::Draw(DrawReason::InsufficientMaterial)));
        }
        if pos.halfmoves() >= 100 {
            return Ok(Some(GameResult::Draw(DrawReason::FiftyMoveRule)));
        }

        let key = position.book_key();
        let seen = history.iter().filter(|p| p.book_key() == key).count() + 1;
        if seen >= 3 {
            return Ok(Some(GameResult::Draw(DrawReason::ThreefoldRepetition)));
        }

        Ok(None)
    }

    fn replay(&self, start: &Position, moves: &[Move]) -> Result<Replay, MatchError> {
        let mut pos = Self::parse(start)?;
        let mut positions = Vec::with_capacity(moves.len() + 1);
        let mut san = Vec::with_capacity(moves.len());
        positions.push(Self::encode(&pos)?);

        for mv in moves {
            let current = positions.last().cloned().unwrap_or_else(|| start.clone());
            let legal = Self::find_move(&pos, mv).ok_or_else(|| MatchError::IllegalMoveSelected {
                mv: mv.clone(),
                position: current,
            })?;
            san.push(SanPlus::from_move_and_play_unchecked(&mut pos, &legal).to_string());
            positions.push(Self::encode(&pos)?);
        }

        Ok(Replay { positions, san })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        Move::parse(s).unwrap()
    }

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    #[test]
    fn test_startpos_has_twenty_moves() {
        let moves = StandardRules.legal_moves(&Position::startpos()).unwrap();
        assert_eq!(moves.len(), 20);
        assert!(moves.contains(&mv("e2e4")));
        assert!(moves.contains(&mv("g1f3")));
    }

    #[test]
    fn test_is_legal() {
        let start = Position::startpos();
        assert!(StandardRules.is_legal(&start, &mv("e2e4")).unwrap());
        assert!(!StandardRules.is_legal(&start, &mv("e2e5")).unwrap());
        assert!(!StandardRules.is_legal(&start, &mv("e7e5")).unwrap());
    }

    #[test]
    fn test_apply_produces_next_position() {
        let next = StandardRules.apply(&Position::startpos(), &mv("e2e4")).unwrap();
        assert_eq!(
            next.as_str(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
        assert_eq!(next.side_to_move(), Side::Black);
    }

    #[test]
    fn test_apply_illegal_move_is_error() {
        let err = StandardRules
            .apply(&Position::startpos(), &mv("e1e2"))
            .unwrap_err();
        assert!(matches!(err, MatchError::IllegalMoveSelected { .. }));
    }

    #[test]
    fn test_invalid_position_is_rules_error() {
        // No kings on the board.
        let empty = pos("8/8/8/8/8/8/8/8 w - -");
        assert!(matches!(
            StandardRules.normalize(&empty),
            Err(MatchError::Rules(_))
        ));
    }

    #[test]
    fn test_normalize_fills_clocks() {
        let short = pos("8/8/8/8/8/8/8/K1k5 w - -");
        let normalized = StandardRules.normalize(&short).unwrap();
        assert_eq!(normalized.as_str(), "8/8/8/8/8/8/8/K1k5 w - - 0 1");
    }

    #[test]
    fn test_promotion_moves_are_lowercase() {
        let position = pos("8/P7/8/8/8/8/8/K1k5 w - - 0 1");
        let moves = StandardRules.legal_moves(&position).unwrap();
        assert!(moves.contains(&mv("a7a8q")));
        assert!(moves.contains(&mv("a7a8n")));
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let position = pos("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert!(StandardRules.is_legal(&position, &mv("e1g1")).unwrap());
        assert!(StandardRules.is_legal(&position, &mv("e1c1")).unwrap());
    }

    #[test]
    fn test_status_checkmate() {
        let mated = pos("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert_eq!(
            StandardRules.status(&mated, &[]).unwrap(),
            Some(GameResult::BlackWins)
        );
    }

    #[test]
    fn test_status_stalemate_and_material() {
        let stalemate = pos("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert_eq!(
            StandardRules.status(&stalemate, &[]).unwrap(),
            Some(GameResult::Draw(DrawReason::Stalemate))
        );

        let bare = pos("8/8/8/8/8/8/8/K1k5 w - - 0 1");
        assert_eq!(
            StandardRules.status(&bare, &[]).unwrap(),
            Some(GameResult::Draw(DrawReason::InsufficientMaterial))
        );
    }

    #[test]
    fn test_status_fifty_move_rule() {
        let position = pos("8/8/8/8/8/8/R7/K1k5 w - - 100 80");
        assert_eq!(
            StandardRules.status(&position, &[]).unwrap(),
            Some(GameResult::Draw(DrawReason::FiftyMoveRule))
        );
    }

    #[test]
    fn test_status_threefold_repetition() {
        let rules = StandardRules;
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"];
        let moves: Vec<Move> = shuffle.iter().map(|m| mv(m)).collect();
        let replay = rules.replay(&Position::startpos(), &moves).unwrap();

        // Start position seen again after 4 and after 8 plies.
        let (last, history) = replay.positions.split_last().unwrap();
        assert_eq!(
            rules.status(last, history).unwrap(),
            Some(GameResult::Draw(DrawReason::ThreefoldRepetition))
        );
        assert_eq!(rules.status(&replay.positions[4], &replay.positions[..4]).unwrap(), None);
    }

    #[test]
    fn test_status_in_progress() {
        assert_eq!(StandardRules.status(&Position::startpos(), &[]).unwrap(), None);
    }

    #[test]
    fn test_replay_san_transcript() {
        let moves: Vec<Move> = ["f2f3", "e7e5", "g2g4", "d8h4"].iter().map(|m| mv(m)).collect();
        let replay = StandardRules.replay(&Position::startpos(), &moves).unwrap();
        assert_eq!(replay.san, vec!["f3", "e5", "g4", "Qh4#"]);
        assert_eq!(replay.positions.len(), 5);
        assert_eq!(
            replay.final_position().unwrap().placement(),
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR"
        );
    }

    #[test]
    fn test_replay_rejects_illegal_move() {
        let moves = vec![mv("e2e4"), mv("e2e4")];
        let err = StandardRules.replay(&Position::startpos(), &moves).unwrap_err();
        match err {
            MatchError::IllegalMoveSelected { mv, position } => {
                assert_eq!(mv.as_str(), "e2e4");
                assert_eq!(position.side_to_move(), Side::Black);
            }
            other => panic!("Expected IllegalMoveSelected, got {other:?}"),
        }
    }

    #[test]
    fn test_result_tokens() {
        assert_eq!(GameResult::WhiteWins.pgn_token(), "1-0");
        assert_eq!(GameResult::BlackWins.pgn_token(), "0-1");
        assert_eq!(GameResult::Draw(DrawReason::Stalemate).pgn_token(), "1/2-1/2");
        assert_eq!(GameResult::Unknown.pgn_token(), "*");
        assert_eq!(GameResult::win_for(Side::Black).winner(), Some(Side::Black));
        assert_eq!(
            GameResult::Draw(DrawReason::FiftyMoveRule).to_string(),
            "draw (fifty-move rule)"
        );
    }
}
