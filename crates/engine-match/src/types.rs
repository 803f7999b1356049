//! Textual value types exchanged with engines: positions, moves and sides.
//!
//! Both [`Position`] and [`Move`] are validated on construction and are
//! immutable afterwards, so the rest of the crate can read their fields
//! without re-checking them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when text does not encode a valid move or position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    /// The text is not a 4-or-5 character coordinate move.
    #[error("invalid move notation: {0:?}")]
    InvalidMove(String),
    /// The text is not a FEN string with at least four fields.
    #[error("invalid position {fen:?}: {reason}")]
    InvalidPosition {
        /// The rejected text.
        fen: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// The side whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Returns the other side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// A move in coordinate notation: `{from}{to}[promotion]`.
///
/// Squares are a file `a-h` followed by a rank `1-8`; the optional
/// promotion piece is one of `q r b n` in lowercase. A move whose from and
/// to squares are equal is the null move (see [`Move::is_null`]).
///
/// # Example
///
/// ```
/// use engine_match::types::Move;
///
/// let mv: Move = "e7e8q".parse().unwrap();
/// assert_eq!(mv.from_square(), "e7");
/// assert_eq!(mv.promotion(), Some('q'));
/// assert!("e7e8Q".parse::<Move>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Move(String);

fn is_square(file: u8, rank: u8) -> bool {
    (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank)
}

impl Move {
    /// The canonical null move emitted by engines as padding.
    pub const NULL: &'static str = "a1a1";

    /// Parses and validates a coordinate move.
    ///
    /// # Errors
    ///
    /// Returns [`NotationError::InvalidMove`] if the text is not 4 or 5
    /// characters, names a square off the board, or carries a promotion
    /// letter other than `q r b n`.
    pub fn parse(text: &str) -> Result<Self, NotationError> {
        let bytes = text.as_bytes();
        let valid = match bytes.len() {
            4 | 5 => {
                is_square(bytes[0], bytes[1])
                    && is_square(bytes[2], bytes[3])
                    && bytes.get(4).map_or(true, |p| b"qrbn".contains(p))
            }
            _ => false,
        };
        if valid {
            Ok(Self(text.to_string()))
        } else {
            Err(NotationError::InvalidMove(text.to_string()))
        }
    }

    /// Returns the move text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the origin square, e.g. `"e2"`.
    #[must_use]
    pub fn from_square(&self) -> &str {
        &self.0[0..2]
    }

    /// Returns the destination square, e.g. `"e4"`.
    #[must_use]
    pub fn to_square(&self) -> &str {
        &self.0[2..4]
    }

    /// Returns the promotion piece letter, if any.
    #[must_use]
    pub fn promotion(&self) -> Option<char> {
        self.0[4..].chars().next()
    }

    /// True for the null move: origin and destination are the same square.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.from_square() == self.to_square()
    }
}

impl FromStr for Move {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A board state in Forsyth-Edwards Notation.
///
/// The string is kept exactly as given; accessors read individual FEN
/// fields. The side to move is always taken from the second field, never by
/// searching the whole string for `w` or `b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    /// The standard starting position.
    pub const STARTING_FEN: &'static str =
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Returns the standard starting position.
    #[must_use]
    pub fn startpos() -> Self {
        Self(Self::STARTING_FEN.to_string())
    }

    /// Validates the shape of a FEN string and wraps it.
    ///
    /// Only the structure is checked here (eight ranks, a side-to-move field
    /// and the castling and en-passant fields). Whether the position is legal
    /// chess is up to the board rules.
    ///
    /// # Errors
    ///
    /// Returns [`NotationError::InvalidPosition`] describing the first
    /// structural problem found.
    pub fn from_fen(fen: &str) -> Result<Self, NotationError> {
        let fen = fen.trim();
        let invalid = |reason| NotationError::InvalidPosition {
            fen: fen.to_string(),
            reason,
        };

        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(invalid("expected at least four fields"));
        }
        if fields[0].split('/').count() != 8 {
            return Err(invalid("piece placement must have eight ranks"));
        }
        if fields[1] != "w" && fields[1] != "b" {
            return Err(invalid("side to move must be 'w' or 'b'"));
        }

        Ok(Self(fields.join(" ")))
    }

    /// Returns the FEN text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.0.split(' ').nth(index)
    }

    /// Returns the piece-placement field.
    #[must_use]
    pub fn placement(&self) -> &str {
        self.field(0).unwrap_or_default()
    }

    /// Returns the side to move, read from the side-to-move field.
    #[must_use]
    pub fn side_to_move(&self) -> Side {
        match self.field(1) {
            Some("b") => Side::Black,
            _ => Side::White,
        }
    }

    /// Returns the fullmove number, defaulting to 1 when the field is absent.
    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.field(5)
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1)
    }

    /// Returns the opening-book key: the first four fields.
    #[must_use]
    pub fn book_key(&self) -> String {
        chess_openings::book_key(&self.0)
    }

    /// Counts the pieces on the board, kings and pawns included.
    #[must_use]
    pub fn piece_count(&self) -> u32 {
        self.placement()
            .chars()
            .filter(char::is_ascii_alphabetic)
            .count() as u32
    }

    /// True when this is the standard starting position (clocks ignored).
    #[must_use]
    pub fn is_standard_start(&self) -> bool {
        self.book_key() == chess_openings::book_key(Self::STARTING_FEN)
    }
}

impl FromStr for Position {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
