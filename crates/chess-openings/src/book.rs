//! Position-keyed opening book storage and lookup.

use std::collections::HashMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use thiserror::Error;

use crate::opening::{BookMove, Opening};

/// Errors that can occur when building or loading an opening book.
#[derive(Debug, Error)]
pub enum BookError {
    /// Failed to read the opening book file.
    #[error("failed to read opening book: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// An opening line contains a move that is not legal where it is played.
    #[error("illegal move {uci} at ply {ply} in opening \"{opening}\"")]
    IllegalMove {
        /// Name of the offending opening line.
        opening: String,
        /// The move as written in the line.
        uci: String,
        /// Zero-based ply of the move within the line.
        ply: u32,
    },
}

/// Returns the book key of a FEN string: its first four fields.
///
/// The halfmove clock and fullmove number do not change which moves are
/// known in a position, so they are stripped.
///
/// # Example
///
/// ```
/// use chess_openings::book_key;
///
/// let key = book_key("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
/// assert_eq!(key, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
/// ```
#[must_use]
pub fn book_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

fn key_of(pos: &Chess) -> String {
    book_key(&Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string())
}

/// A move table that maps positions to weighted candidate moves.
///
/// Positions are identified by [`book_key`], so transpositions between
/// different opening lines share their entries.
#[derive(Debug, Clone, Default)]
pub struct OpeningBook {
    positions: HashMap<String, Vec<BookMove>>,
}

impl OpeningBook {
    /// Creates a new empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from a list of opening lines.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::IllegalMove`] if any line contains a move that is
    /// not legal in the position where it is played.
    pub fn from_openings<'a, I>(openings: I) -> Result<Self, BookError>
    where
        I: IntoIterator<Item = &'a Opening>,
    {
        let mut book = Self::new();
        for opening in openings {
            book.add_opening(opening)?;
        }
        Ok(book)
    }

    /// Parses a JSON array of [`Opening`]s and builds a book from it.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::JsonError`] for malformed JSON and
    /// [`BookError::IllegalMove`] for lines that cannot be replayed.
    pub fn from_json_str(json: &str) -> Result<Self, BookError> {
        let openings: Vec<Opening> = serde_json::from_str(json)?;
        Self::from_openings(&openings)
    }

    /// Reads a JSON opening file from disk.
    ///
    /// # Errors
    ///
    /// See [`Self::from_json_str`]; additionally [`BookError::IoError`] if the
    /// file cannot be read.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, BookError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Returns true if the book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the number of positions in the book.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Adds a single candidate move for a position.
    ///
    /// If the move is already known for the position, the weights are summed
    /// and the smaller ply is kept.
    pub fn add_move(&mut self, position_key: impl Into<String>, mv: BookMove) {
        let entry = self.positions.entry(position_key.into()).or_default();
        match entry.iter_mut().find(|m| m.uci == mv.uci) {
            Some(existing) => {
                existing.weight = existing.weight.saturating_add(mv.weight);
                existing.ply = existing.ply.min(mv.ply);
            }
            None => entry.push(mv),
        }
    }

    /// Replays an opening line from the initial position and records each
    /// of its moves under the position where it is played.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::IllegalMove`] on the first move that is not legal.
    /// Moves recorded before the illegal one are kept.
    pub fn add_opening(&mut self, opening: &Opening) -> Result<(), BookError> {
        let mut pos = Chess::default();
        for (ply, uci) in opening.moves.iter().enumerate() {
            let ply = ply as u32;
            let legal = pos
                .legal_moves()
                .into_iter()
                .find(|m| m.to_uci(CastlingMode::Standard).to_string() == *uci)
                .ok_or_else(|| BookError::IllegalMove {
                    opening: opening.name.clone(),
                    uci: uci.clone(),
                    ply,
                })?;
            self.add_move(key_of(&pos), BookMove::new(uci.clone(), opening.weight, ply));
            pos.play_unchecked(&legal);
        }
        Ok(())
    }

    /// Looks up the candidate moves for a position whose ply is below `max_ply`.
    #[must_use]
    pub fn lookup(&self, position_key: &str, max_ply: u32) -> Vec<&BookMove> {
        self.positions
            .get(position_key)
            .map(|moves| moves.iter().filter(|m| m.ply < max_ply).collect())
            .unwrap_or_default()
    }

    /// Selects a random candidate for a position, weighted by the move weights.
    ///
    /// Returns `None` when the book has nothing for the position within
    /// `max_ply`.
    pub fn select_move<R: Rng>(
        &self,
        position_key: &str,
        max_ply: u32,
        rng: &mut R,
    ) -> Option<&BookMove> {
        let moves = self.lookup(position_key, max_ply);
        if moves.is_empty() {
            return None;
        }

        let total_weight: u64 = moves.iter().map(|m| u64::from(m.weight)).sum();
        if total_weight == 0 {
            // All weights zero: uniform choice.
            return moves.choose(rng).copied();
        }

        let mut choice = rng.gen_range(0..total_weight);
        for &mv in &moves {
            let weight = u64::from(mv.weight);
            if choice < weight {
                return Some(mv);
            }
            choice -= weight;
        }

        moves.last().copied()
    }
}
